//! HTTP client for submitting finished games.

use crate::error::ErrorBody;
use crate::results::ResultResponse;
use anyhow::{Context, Result, bail};
use promo_tictactoe::ResultReport;
use reqwest::header::{COOKIE, SET_COOKIE};
use std::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Posts result reports and carries the session cookie between them.
#[derive(Debug)]
pub struct ResultClient {
    endpoint: String,
    client: reqwest::Client,
    cookie: Mutex<Option<String>>,
}

impl ResultClient {
    /// Creates a client for the server at `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self {
            endpoint: format!("{}/api/result", base_url.trim_end_matches('/')),
            client: reqwest::Client::new(),
            cookie: Mutex::new(None),
        }
    }

    /// Submits one report and returns the server's answer.
    #[instrument(skip(self, report), fields(result = %report.result(), event_id = %report.event_id()))]
    pub async fn submit(&self, report: &ResultReport) -> Result<ResultResponse> {
        let mut request = self.client.post(&self.endpoint).json(report);
        if let Some(cookie) = self.current_cookie() {
            request = request.header(COOKIE, cookie);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach promo server")?;
        self.remember_cookie(response.headers());

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            warn!(%status, error = %message, "Report refused");
            bail!("Server returned {}: {}", status, message);
        }

        let parsed: ResultResponse = response
            .json()
            .await
            .context("Failed to parse result response")?;
        info!(code_issued = parsed.code.is_some(), "Report accepted");
        Ok(parsed)
    }

    fn current_cookie(&self) -> Option<String> {
        self.cookie
            .lock()
            .map(|c| c.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn remember_cookie(&self, headers: &reqwest::header::HeaderMap) {
        let Some(pair) = headers
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
        else {
            return;
        };
        debug!("Session cookie stored");
        let mut slot = self
            .cookie
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(pair.trim().to_string());
    }
}
