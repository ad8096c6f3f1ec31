//! Session key resolution from request cookies.

use crate::error::ReportError;
use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Length of minted session keys.
const SESSION_KEY_LEN: usize = 32;

/// What to do when a request carries no usable session cookie.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionPolicy {
    /// Mint a fresh anonymous session and set the cookie.
    #[default]
    Anonymous,
    /// Reject the request.
    Strict,
}

/// A resolved session key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSession {
    /// Opaque key used by the promo ledger.
    pub key: String,
    /// `Set-Cookie` value when the key was minted for this request.
    pub set_cookie: Option<String>,
}

/// Maps a request to an opaque session key.
#[derive(Debug, Clone)]
pub struct SessionResolver {
    cookie_name: String,
    policy: SessionPolicy,
}

impl SessionResolver {
    /// Creates a resolver reading `cookie_name`.
    pub fn new(cookie_name: impl Into<String>, policy: SessionPolicy) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            policy,
        }
    }

    /// Resolves the session for a request.
    #[instrument(skip(self, headers), fields(policy = %self.policy))]
    pub fn resolve(&self, headers: &HeaderMap) -> Result<ResolvedSession, ReportError> {
        if let Some(key) = self.cookie_value(headers) {
            debug!("Session cookie found");
            return Ok(ResolvedSession {
                key,
                set_cookie: None,
            });
        }

        match self.policy {
            SessionPolicy::Strict => {
                warn!("Request without a valid session rejected");
                Err(ReportError::SessionRequired)
            }
            SessionPolicy::Anonymous => {
                let key: String = rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(SESSION_KEY_LEN)
                    .map(char::from)
                    .collect();
                debug!("Minted anonymous session");
                let set_cookie = format!(
                    "{}={}; Path=/; HttpOnly; SameSite=Lax",
                    self.cookie_name, key
                );
                Ok(ResolvedSession {
                    key,
                    set_cookie: Some(set_cookie),
                })
            }
        }
    }

    fn cookie_value(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie_name)
            .map(|(_, value)| value.trim())
            .filter(|value| is_valid_session_key(value))
            .map(str::to_owned)
    }
}

/// 16 to 64 characters of `[A-Za-z0-9_-]`.
pub fn is_valid_session_key(value: &str) -> bool {
    (16..=64).contains(&value.len())
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}
