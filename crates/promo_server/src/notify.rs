//! Outbound notifications about game results.
//!
//! Delivery is best effort. Messages go onto a queue drained by a background
//! task; the request that produced them never waits for delivery and never
//! sees its failure.

use async_trait::async_trait;
use derive_more::{Display, Error};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Notification delivery error.
#[derive(Debug, Clone, Display, Error)]
#[display("Notify error: {} at {}:{}", message, file, line)]
pub struct NotifyError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl NotifyError {
    /// Creates a new notification error with caller location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<reqwest::Error> for NotifyError {
    #[track_caller]
    fn from(err: reqwest::Error) -> Self {
        Self::new(format!("HTTP error: {}", err))
    }
}

/// Delivers a message to the configured destination.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends one message.
    async fn notify(&self, message: &str) -> Result<(), NotifyError>;
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        info!(message, "Notification (no destination configured)");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Posts messages to a chat through the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramNotifier {
    /// Creates a notifier for `chat_id`, sending through `api_base`.
    #[instrument(skip(bot_token))]
    pub fn new(api_base: &str, bot_token: &str, chat_id: String) -> Self {
        let endpoint = format!(
            "{}/bot{}/sendMessage",
            api_base.trim_end_matches('/'),
            bot_token
        );
        Self {
            client: reqwest::Client::new(),
            endpoint,
            chat_id,
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip(self, message), fields(chat_id = %self.chat_id))]
    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text: message,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::new(format!(
                "Message rejected with {}: {}",
                status, body
            )));
        }
        debug!("Message delivered");
        Ok(())
    }
}

/// Handle for queueing messages onto the delivery worker.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<String>,
}

impl NotificationQueue {
    /// Spawns the delivery worker on the current tokio runtime.
    #[instrument(skip(notifier))]
    pub fn spawn(notifier: Arc<dyn Notifier>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = notifier.notify(&message).await {
                    warn!(error = %e, "Notification delivery failed");
                }
            }
            debug!("Notification queue closed");
        });
        Self { tx }
    }

    /// Queues a message. Never blocks and never fails the caller.
    pub fn enqueue(&self, message: String) {
        if self.tx.send(message).is_err() {
            warn!("Notification worker has stopped; message dropped");
        }
    }
}
