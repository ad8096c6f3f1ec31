//! Server configuration.

use crate::ledger::LedgerPolicy;
use crate::notify::{LogNotifier, Notifier, TelegramNotifier};
use crate::session::SessionPolicy;
use chrono::TimeDelta;
use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Environment variable holding the bot token.
pub const BOT_TOKEN_ENV: &str = "PROMO_BOT_TOKEN";
/// Environment variable overriding the chat id.
pub const CHAT_ID_ENV: &str = "PROMO_CHAT_ID";
/// Environment variable overriding the port.
pub const PORT_ENV: &str = "PORT";

/// Where notifications are delivered.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Bot API base URL.
    #[serde(default = "default_api_base")]
    api_base: String,

    /// Destination chat. Notifications are only logged when unset.
    #[serde(default)]
    chat_id: Option<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            chat_id: None,
        }
    }
}

/// Configuration for the promo server.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    host: String,

    /// Port to bind to.
    #[serde(default = "default_port")]
    port: u16,

    /// How long issued codes stay on record.
    #[serde(default = "default_promo_ttl_secs")]
    promo_ttl_secs: u64,

    /// Minimum time before a session can receive a new code.
    #[serde(default = "default_cooldown_secs")]
    cooldown_secs: u64,

    /// How long replayed responses are remembered.
    #[serde(default = "default_idempotency_ttl_secs")]
    idempotency_ttl_secs: u64,

    /// Candidate codes drawn before giving up.
    #[serde(default = "default_max_code_attempts")]
    max_code_attempts: u32,

    /// Name of the session cookie.
    #[serde(default = "default_session_cookie")]
    session_cookie: String,

    /// Behaviour for requests without a session cookie.
    #[serde(default)]
    session_policy: SessionPolicy,

    /// Notification destination.
    #[serde(default)]
    notifier: NotifierConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_promo_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_cooldown_secs() -> u64 {
    24 * 60 * 60
}

fn default_idempotency_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_max_code_attempts() -> u32 {
    50
}

fn default_session_cookie() -> String {
    "promo_sid".to_string()
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            promo_ttl_secs: default_promo_ttl_secs(),
            cooldown_secs: default_cooldown_secs(),
            idempotency_ttl_secs: default_idempotency_ttl_secs(),
            max_code_attempts: default_max_code_attempts(),
            session_cookie: default_session_cookie(),
            session_policy: SessionPolicy::default(),
            notifier: NotifierConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if it exists, defaults otherwise, then applies the environment.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = if path.as_ref().exists() {
            Self::from_file(path.as_ref())?
        } else {
            info!("Config file not found, using defaults");
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies overrides from `lookup`, normally the process environment.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(port) = lookup(PORT_ENV) {
            self.port = port
                .parse()
                .map_err(|e| ConfigError::new(format!("Invalid {}: {}", PORT_ENV, e)))?;
        }
        if let Some(chat_id) = lookup(CHAT_ID_ENV) {
            self.notifier.chat_id = Some(chat_id);
        }
        Ok(())
    }

    /// Overrides host and port from the command line.
    pub fn with_bind(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_code_attempts == 0 {
            return Err(ConfigError::new("max_code_attempts must be at least 1".to_string()));
        }
        self.ledger_policy()?;
        self.idempotency_ttl()?;
        Ok(())
    }

    /// Ledger timing derived from this configuration.
    pub fn ledger_policy(&self) -> Result<LedgerPolicy, ConfigError> {
        Ok(LedgerPolicy::new(
            seconds(self.cooldown_secs, "cooldown_secs")?,
            seconds(self.promo_ttl_secs, "promo_ttl_secs")?,
            self.max_code_attempts,
        ))
    }

    /// Replay window derived from this configuration.
    pub fn idempotency_ttl(&self) -> Result<TimeDelta, ConfigError> {
        seconds(self.idempotency_ttl_secs, "idempotency_ttl_secs")
    }

    /// Builds the notifier: Telegram when a token and chat are known, logging otherwise.
    #[instrument(skip(self, bot_token))]
    pub fn build_notifier(&self, bot_token: Option<String>) -> Arc<dyn Notifier> {
        match (bot_token, &self.notifier.chat_id) {
            (Some(token), Some(chat_id)) => {
                info!(chat_id = %chat_id, "Telegram notifications enabled");
                Arc::new(TelegramNotifier::new(
                    &self.notifier.api_base,
                    &token,
                    chat_id.clone(),
                ))
            }
            _ => {
                info!("No notification destination configured, logging only");
                Arc::new(LogNotifier)
            }
        }
    }
}

fn seconds(value: u64, field: &str) -> Result<TimeDelta, ConfigError> {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .filter(|d| *d > TimeDelta::zero())
        .ok_or_else(|| ConfigError::new(format!("{} out of range: {}", field, value)))
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port(), &3000);
        let policy = config.ledger_policy().expect("valid");
        assert_eq!(policy.ttl, TimeDelta::days(7));
        assert_eq!(policy.cooldown, TimeDelta::hours(24));
        assert_eq!(config.idempotency_ttl().expect("valid"), TimeDelta::hours(24));
        assert_eq!(config.session_policy(), &SessionPolicy::Anonymous);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml(
            r#"
            port = 8080
            cooldown_secs = 60
            session_policy = "strict"

            [notifier]
            chat_id = "-100123"
            "#,
        )
        .expect("parse");
        assert_eq!(config.port(), &8080);
        assert_eq!(config.host(), "127.0.0.1");
        assert_eq!(config.ledger_policy().expect("valid").cooldown, TimeDelta::seconds(60));
        assert_eq!(config.session_policy(), &SessionPolicy::Strict);
        assert_eq!(config.notifier().chat_id().as_deref(), Some("-100123"));
        assert_eq!(config.notifier().api_base(), "https://api.telegram.org");
    }

    #[test]
    fn test_rejects_zero_attempts_and_zero_windows() {
        assert!(ServerConfig::from_toml("max_code_attempts = 0").is_err());
        assert!(ServerConfig::from_toml("promo_ttl_secs = 0").is_err());
        assert!(ServerConfig::from_toml("port = \"eighty\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ServerConfig::default();
        config
            .apply_env(|key| match key {
                PORT_ENV => Some("9090".to_string()),
                CHAT_ID_ENV => Some("777".to_string()),
                _ => None,
            })
            .expect("apply");
        assert_eq!(config.port(), &9090);
        assert_eq!(config.notifier().chat_id().as_deref(), Some("777"));

        let bad = config.apply_env(|key| (key == PORT_ENV).then(|| "nope".to_string()));
        assert!(bad.is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "host = \"0.0.0.0\"\nmax_code_attempts = 7").expect("write");
        let config = ServerConfig::from_file(file.path()).expect("load");
        assert_eq!(config.host(), "0.0.0.0");
        assert_eq!(config.max_code_attempts(), &7);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = ServerConfig::load(dir.path().join("absent.toml")).expect("defaults");
        assert_eq!(config.session_cookie(), "promo_sid");
    }
}
