//! Result reporting errors and their HTTP mapping.

use crate::ledger::LedgerError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Message shown to players when no code can be issued.
pub const PROMO_UNAVAILABLE: &str = "promo code unavailable, try later";

/// Why a result report was refused.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum ReportError {
    /// Malformed result or event id. Rejected before any state changes.
    #[display("Invalid payload: {}", _0)]
    InvalidPayload(String),

    /// No unique promo code could be generated.
    #[display("Promo code unavailable after {} attempts", attempts)]
    LedgerExhausted {
        /// Attempts made.
        attempts: u32,
    },

    /// The deployment requires a session and the request had none.
    #[display("Session required")]
    SessionRequired,
}

impl std::error::Error for ReportError {}

impl From<LedgerError> for ReportError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Exhausted { attempts } => ReportError::LedgerExhausted { attempts },
        }
    }
}

impl ReportError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ReportError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ReportError::LedgerExhausted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ReportError::SessionRequired => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Error body returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Always `"error"`.
    pub status: String,
    /// Player-facing message.
    pub error: String,
}

impl IntoResponse for ReportError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            ReportError::LedgerExhausted { .. } => PROMO_UNAVAILABLE.to_string(),
            other => other.to_string(),
        };
        warn!(%status, error = %self, "Result report refused");
        let body = ErrorBody {
            status: "error".to_string(),
            error,
        };
        (status, Json(body)).into_response()
    }
}
