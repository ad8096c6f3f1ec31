//! End-to-end tests for the result endpoint.

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, Request, StatusCode};
use chrono::{DateTime, TimeDelta, Utc};
use http_body_util::BodyExt;
use promo_server::{
    AppState, CODE_MAX, CODE_MIN, CodeSource, ErrorBody, LOSS_MESSAGE, LedgerPolicy,
    ManualClock, NotificationQueue, Notifier, NotifyError, PROMO_UNAVAILABLE, PromoStore,
    RandomCodes, ResultResponse, ResultService, SessionPolicy, SessionResolver, router,
    win_message,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tower::ServiceExt;

#[derive(Debug, Default)]
struct Recorder {
    sent: Mutex<Vec<String>>,
    arrived: Notify,
}

#[async_trait]
impl Notifier for Recorder {
    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(message.to_string());
        self.arrived.notify_one();
        Ok(())
    }
}

impl Recorder {
    async fn wait_for(&self, count: usize) -> Vec<String> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                {
                    let sent = self.sent.lock().unwrap();
                    if sent.len() >= count {
                        return sent.clone();
                    }
                }
                self.arrived.notified().await;
            }
        })
        .await
        .expect("notifications delivered")
    }
}

#[derive(Debug)]
struct SameCode(u32);

impl CodeSource for SameCode {
    fn next_code(&mut self) -> u32 {
        self.0
    }
}

struct Harness {
    app: Router,
    clock: ManualClock,
    recorder: Arc<Recorder>,
    results: ResultService,
}

fn start() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(20_000)
}

fn harness_with(policy: SessionPolicy, ledger: LedgerPolicy, source: Box<dyn CodeSource>) -> Harness {
    let clock = ManualClock::new(start());
    let recorder = Arc::new(Recorder::default());
    let notifications = NotificationQueue::spawn(recorder.clone());
    let store = PromoStore::new(ledger, TimeDelta::hours(24), source);
    let results = ResultService::new(store, Arc::new(clock.clone()), notifications);
    let state = AppState::new(results.clone(), SessionResolver::new("promo_sid", policy));
    Harness {
        app: router(state),
        clock,
        recorder,
        results,
    }
}

fn harness() -> Harness {
    harness_with(
        SessionPolicy::Anonymous,
        LedgerPolicy::default(),
        Box::new(RandomCodes::seeded(42)),
    )
}

fn session(name: &str) -> String {
    format!("promo_sid=session_{:0>12}", name)
}

async fn post(app: &Router, cookie: Option<&str>, body: &str) -> (StatusCode, HeaderMap, Bytes) {
    let mut request = Request::builder()
        .method("POST")
        .uri("/api/result")
        .header(CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        request = request.header(COOKIE, cookie);
    }
    let response = app
        .clone()
        .oneshot(request.body(Body::from(body.to_owned())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, bytes)
}

fn parse(bytes: &Bytes) -> ResultResponse {
    serde_json::from_slice(bytes).expect("result response")
}

async fn win_code(app: &Router, cookie: &str) -> String {
    let (status, _, body) = post(app, Some(cookie), r#"{"result":"win"}"#).await;
    assert_eq!(status, StatusCode::OK);
    parse(&body).code.expect("win carries a code")
}

#[tokio::test]
async fn test_replayed_event_is_byte_identical_and_mints_once() {
    let h = harness();
    let cookie = session("a");
    let body = r#"{"result":"win","eventId":"evt_000001"}"#;

    let (first_status, _, first) = post(&h.app, Some(&cookie), body).await;
    let (second_status, _, second) = post(&h.app, Some(&cookie), body).await;

    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first, second);
    assert_eq!(h.results.inspect(|s| s.ledger.live_codes()), 1);

    // The replay triggers nothing; the next delivery is the loss.
    post(&h.app, Some(&cookie), r#"{"result":"loss","eventId":"evt_000002"}"#).await;
    let code = parse(&first).code.expect("code");
    assert_eq!(
        h.recorder.wait_for(2).await,
        vec![win_message(&code), LOSS_MESSAGE.to_string()]
    );
}

#[tokio::test]
async fn test_replay_from_another_session_returns_first_response() {
    let h = harness();
    let body = r#"{"result":"win","eventId":"shared_event"}"#;

    let (_, _, first) = post(&h.app, Some(&session("a")), body).await;
    let (_, _, second) = post(&h.app, Some(&session("b")), body).await;

    assert_eq!(first, second);
    assert_eq!(h.results.inspect(|s| s.ledger.live_codes()), 1);
}

#[tokio::test]
async fn test_same_session_within_cooldown_gets_same_code() {
    let h = harness();
    let cookie = session("a");

    let first = win_code(&h.app, &cookie).await;
    h.clock.advance(TimeDelta::hours(23));
    let second = win_code(&h.app, &cookie).await;

    assert_eq!(first, second);
    assert_eq!(h.results.inspect(|s| s.ledger.live_codes()), 1);
}

#[tokio::test]
async fn test_new_code_after_cooldown() {
    let h = harness();
    let cookie = session("a");

    let first = win_code(&h.app, &cookie).await;
    h.clock.advance(TimeDelta::hours(25));
    let second = win_code(&h.app, &cookie).await;

    assert_ne!(first, second);
    // The first code is still live until it expires.
    assert_eq!(h.results.inspect(|s| s.ledger.live_codes()), 2);
}

#[tokio::test]
async fn test_codes_expire_after_ttl() {
    let h = harness();
    let first = win_code(&h.app, &session("a")).await;

    h.clock.advance(TimeDelta::days(8));
    win_code(&h.app, &session("b")).await;

    h.results.inspect(|s| {
        assert!(s.ledger.lookup_code(&first).is_none());
        assert!(s.ledger.grant("session_00000000000a").is_none());
        assert_eq!(s.ledger.live_codes(), 1);
    });
}

#[tokio::test]
async fn test_invalid_payloads_are_rejected_without_side_effects() {
    let h = harness();
    let cookie = session("a");

    for body in [
        r#"{"result":"victory"}"#,
        r#"{"result":"WIN"}"#,
        r#"{"result":"win","eventId":"short"}"#,
        r#"{"result":"win","eventId":"has spaces in it"}"#,
        r#"{}"#,
        "not json",
    ] {
        let (status, _, bytes) = post(&h.app, Some(&cookie), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        let error: ErrorBody = serde_json::from_slice(&bytes).expect("error body");
        assert_eq!(error.status, "error");
    }

    h.results.inspect(|s| {
        assert_eq!(s.ledger.live_codes(), 0);
        assert!(s.idempotency.is_empty());
    });
}

#[tokio::test]
async fn test_strict_policy_requires_session() {
    let h = harness_with(
        SessionPolicy::Strict,
        LedgerPolicy::default(),
        Box::new(RandomCodes::seeded(1)),
    );

    let (status, _, bytes) = post(&h.app, None, r#"{"result":"win"}"#).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let error: ErrorBody = serde_json::from_slice(&bytes).expect("error body");
    assert_eq!(error.status, "error");
    assert_eq!(h.results.inspect(|s| s.ledger.live_codes()), 0);

    let (status, _, _) = post(&h.app, Some(&session("a")), r#"{"result":"win"}"#).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_strict_policy_reports_bad_payload_before_missing_session() {
    let h = harness_with(
        SessionPolicy::Strict,
        LedgerPolicy::default(),
        Box::new(RandomCodes::seeded(1)),
    );

    let (status, _, _) = post(&h.app, None, r#"{"result":"victory"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _, _) = post(&h.app, None, r#"{"result":"win","eventId":"bad"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_anonymous_policy_sets_cookie() {
    let h = harness();

    let (status, headers, _) = post(&h.app, None, r#"{"result":"loss"}"#).await;
    assert_eq!(status, StatusCode::OK);
    let cookie = headers
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("session cookie");
    assert!(cookie.starts_with("promo_sid="));

    let (_, headers, _) = post(&h.app, Some(&session("a")), r#"{"result":"loss"}"#).await;
    assert!(headers.get(SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_exhausted_code_space_returns_unavailable() {
    let h = harness_with(
        SessionPolicy::Anonymous,
        LedgerPolicy::new(TimeDelta::hours(24), TimeDelta::days(7), 3),
        Box::new(SameCode(12345)),
    );

    assert_eq!(win_code(&h.app, &session("a")).await, "12345");

    let body = r#"{"result":"win","eventId":"evt_exhausted"}"#;
    for _ in 0..2 {
        let (status, _, bytes) = post(&h.app, Some(&session("b")), body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let error: ErrorBody = serde_json::from_slice(&bytes).expect("error body");
        assert_eq!(error.error, PROMO_UNAVAILABLE);
    }

    h.results.inspect(|s| {
        assert_eq!(s.ledger.live_codes(), 1);
        assert!(s.ledger.grant("session_00000000000b").is_none());
        assert!(s.idempotency.is_empty());
    });
}

#[tokio::test]
async fn test_codes_are_unique_across_sessions() {
    let h = harness();
    let mut seen = HashSet::new();

    for i in 0..300 {
        let code = win_code(&h.app, &session(&i.to_string())).await;
        let value: u32 = code.parse().expect("numeric code");
        assert!((CODE_MIN..=CODE_MAX).contains(&value));
        assert_eq!(code.len(), 5);
        assert!(seen.insert(code), "duplicate code");
    }
    assert_eq!(h.results.inspect(|s| s.ledger.live_codes()), 300);
}

#[tokio::test]
async fn test_draw_is_accepted_without_notification() {
    let h = harness();
    let cookie = session("a");

    let (status, _, bytes) = post(&h.app, Some(&cookie), r#"{"result":"draw"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&bytes[..], br#"{"status":"ok"}"#);
    assert_eq!(h.results.inspect(|s| s.ledger.live_codes()), 0);

    post(&h.app, Some(&cookie), r#"{"result":"loss"}"#).await;
    assert_eq!(h.recorder.wait_for(1).await, vec![LOSS_MESSAGE.to_string()]);
}

#[tokio::test]
async fn test_health() {
    let h = harness();
    let response = h
        .app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}
