//! HTTP surface for result reporting.

use crate::clock::Clock;
use crate::config::{ConfigError, ServerConfig};
use crate::error::ReportError;
use crate::ledger::RandomCodes;
use crate::notify::NotificationQueue;
use crate::results::{PromoStore, ResultResponse, ResultService, SubmitResult, validate};
use crate::session::SessionResolver;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Shared state behind the router.
#[derive(Clone)]
pub struct AppState {
    /// Result processing.
    pub results: ResultService,
    /// Session lookup.
    pub sessions: SessionResolver,
}

impl AppState {
    /// Bundles the services.
    pub fn new(results: ResultService, sessions: SessionResolver) -> Self {
        Self { results, sessions }
    }

    /// Wires fresh stores and a session resolver from configuration.
    pub fn from_config(
        config: &ServerConfig,
        clock: Arc<dyn Clock>,
        notifications: NotificationQueue,
    ) -> Result<Self, ConfigError> {
        let store = PromoStore::new(
            config.ledger_policy()?,
            config.idempotency_ttl()?,
            Box::new(RandomCodes::from_entropy()),
        );
        Ok(Self::new(
            ResultService::new(store, clock, notifications),
            SessionResolver::new(config.session_cookie().clone(), *config.session_policy()),
        ))
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/result", post(submit_result))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[instrument(skip_all)]
async fn submit_result(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SubmitResult>, JsonRejection>,
) -> Result<Response, ReportError> {
    let Json(submission) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Malformed result body");
        ReportError::InvalidPayload(rejection.body_text())
    })?;

    // Payload problems win over a missing session.
    let report = validate(&submission).inspect_err(|e| warn!(error = %e, "Rejected report"))?;
    let session = state.sessions.resolve(&headers)?;
    let result = report.result;
    let response: ResultResponse = state.results.report(report, &session.key)?;
    info!(%result, code_issued = response.code.is_some(), "Result accepted");

    let mut http = Json(response).into_response();
    if let Some(cookie) = session.set_cookie {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                http.headers_mut().insert(SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Session cookie not representable as a header"),
        }
    }
    Ok(http)
}
