//! Result reporting: validation, promo issuance, replay protection.

use crate::clock::Clock;
use crate::error::ReportError;
use crate::idempotency::IdempotencyCache;
use crate::ledger::{CodeSource, LedgerPolicy, PromoLedger};
use crate::notify::NotificationQueue;
use chrono::{DateTime, TimeDelta, Utc};
use promo_tictactoe::GameResult;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument};

/// Notification text for a loss.
pub const LOSS_MESSAGE: &str = "Player lost a game to the computer.";

/// Notification text for a win.
pub fn win_message(code: &str) -> String {
    format!("Player won a game! Promo code issued: {}", code)
}

/// Incoming result submission, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResult {
    /// `win`, `loss` or `draw`.
    pub result: String,
    /// Optional idempotency token.
    #[serde(default)]
    pub event_id: Option<String>,
}

/// Successful response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultResponse {
    /// Always `"ok"`.
    pub status: String,
    /// Promo code, on a win.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ResultResponse {
    /// Response without a code.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            code: None,
        }
    }

    /// Response carrying a promo code.
    pub fn with_code(code: String) -> Self {
        Self {
            code: Some(code),
            ..Self::ok()
        }
    }
}

/// A submission that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedReport {
    /// What happened.
    pub result: GameResult,
    /// Idempotency token.
    pub event_id: Option<String>,
}

/// Checks the result value and the event id format.
pub fn validate(submission: &SubmitResult) -> Result<ValidatedReport, ReportError> {
    let result = GameResult::from_str(&submission.result).map_err(|_| {
        ReportError::InvalidPayload(format!("unknown result {:?}", submission.result))
    })?;

    if let Some(event_id) = &submission.event_id
        && !is_valid_event_id(event_id)
    {
        return Err(ReportError::InvalidPayload(
            "eventId must be 6-64 characters of [A-Za-z0-9_-]".to_string(),
        ));
    }

    Ok(ValidatedReport {
        result,
        event_id: submission.event_id.clone(),
    })
}

/// 6 to 64 characters of `[A-Za-z0-9_-]`.
pub fn is_valid_event_id(value: &str) -> bool {
    (6..=64).contains(&value.len())
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Promo ledger and replay cache, guarded together.
#[derive(Debug)]
pub struct PromoStore {
    /// Session and code indices.
    pub ledger: PromoLedger,
    /// Responses by event id.
    pub idempotency: IdempotencyCache<ResultResponse>,
}

impl PromoStore {
    /// Creates empty stores.
    pub fn new(policy: LedgerPolicy, idempotency_ttl: TimeDelta, source: Box<dyn CodeSource>) -> Self {
        Self {
            ledger: PromoLedger::new(policy, source),
            idempotency: IdempotencyCache::new(idempotency_ttl),
        }
    }

    /// Drops expired entries from both stores.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        self.ledger.prune(now);
        self.idempotency.prune(now);
    }
}

/// Handles result reports.
#[derive(Clone)]
pub struct ResultService {
    store: Arc<Mutex<PromoStore>>,
    clock: Arc<dyn Clock>,
    notifications: NotificationQueue,
}

impl ResultService {
    /// Creates the service around freshly initialised stores.
    pub fn new(store: PromoStore, clock: Arc<dyn Clock>, notifications: NotificationQueue) -> Self {
        info!("Creating result service");
        Self {
            store: Arc::new(Mutex::new(store)),
            clock,
            notifications,
        }
    }

    // Never held across an await.
    fn lock(&self) -> MutexGuard<'_, PromoStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Processes one validated report for `session_key`.
    ///
    /// Repeated event ids get the first response back and trigger nothing.
    /// Notifications are queued after the store is released.
    #[instrument(skip(self, report), fields(result = %report.result))]
    pub fn report(
        &self,
        report: ValidatedReport,
        session_key: &str,
    ) -> Result<ResultResponse, ReportError> {
        let now = self.clock.now();

        let mut outbound = None;
        let response = {
            let mut store = self.lock();
            store.prune(now);
            let PromoStore {
                ledger,
                idempotency,
            } = &mut *store;

            idempotency.with_idempotency(
                report.event_id.as_deref(),
                now,
                || -> Result<ResultResponse, ReportError> {
                    match report.result {
                        GameResult::Win => {
                            let code = ledger.issue_or_reuse(session_key, now)?;
                            outbound = Some(win_message(&code));
                            Ok(ResultResponse::with_code(code))
                        }
                        GameResult::Loss => {
                            outbound = Some(LOSS_MESSAGE.to_string());
                            Ok(ResultResponse::ok())
                        }
                        GameResult::Draw => Ok(ResultResponse::ok()),
                    }
                },
            )?
        };

        match outbound {
            Some(message) => self.notifications.enqueue(message),
            None => debug!("Nothing to notify"),
        }
        Ok(response)
    }

    /// Runs `f` with shared access to the stores.
    pub fn inspect<T>(&self, f: impl FnOnce(&PromoStore) -> T) -> T {
        f(&self.lock())
    }
}
