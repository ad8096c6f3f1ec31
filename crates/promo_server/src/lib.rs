//! Promo Server - result relay and promo code issuance for tic-tac-toe.
//!
//! # Architecture
//!
//! - **Ledger**: unique five-digit codes per session with cooldown and expiry
//! - **Idempotency**: replayed event ids get the first response back
//! - **Results**: validation and orchestration behind one lock
//! - **Notify**: best-effort delivery on a background worker
//! - **HTTP**: axum router for `POST /api/result`
//! - **Play**: terminal client that reports finished games

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod clock;
mod config;
mod error;
mod http;
mod idempotency;
mod ledger;
mod notify;
mod play;
mod results;
mod session;

pub use client::ResultClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BOT_TOKEN_ENV, CHAT_ID_ENV, ConfigError, NotifierConfig, PORT_ENV, ServerConfig};
pub use error::{ErrorBody, PROMO_UNAVAILABLE, ReportError};
pub use http::{AppState, router};
pub use idempotency::IdempotencyCache;
pub use ledger::{
    CODE_MAX, CODE_MIN, CodeRecord, CodeSource, LedgerError, LedgerPolicy, PromoLedger,
    RandomCodes, SessionGrant,
};
pub use notify::{LogNotifier, NotificationQueue, Notifier, NotifyError, TelegramNotifier};
pub use play::PlaySession;
pub use results::{
    LOSS_MESSAGE, PromoStore, ResultResponse, ResultService, SubmitResult, ValidatedReport,
    is_valid_event_id, validate, win_message,
};
pub use session::{ResolvedSession, SessionPolicy, SessionResolver, is_valid_session_key};
