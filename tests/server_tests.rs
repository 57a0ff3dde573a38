//! Postback server routes driven end to end through the router.

mod harness;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Duration;
use harness::recording_notifier::RecordingNotifier;
use sensexbot::adapter::inbound::http::{router, ServerState};
use sensexbot::adapter::outbound::credential::EnvFileCredentialStore;
use sensexbot::application::auth::{token_view, AuthService, AuthSettings};
use sensexbot::domain::TradingMode;
use sensexbot::port::outbound::notifier::Event;
use sensexbot::testkit::auth::ScriptedExchanger;
use sensexbot::testkit::domain::market_hours;
use sensexbot::testkit::runtime::StubRuntime;
use sensexbot::testkit::store::MemoryStore;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const ACCESS_TOKEN: &str = "abcdefghijklmnopqrstuvwxyz012345";

struct Fixture {
    app: Router,
    auth: Arc<AuthService>,
    credentials: Arc<EnvFileCredentialStore>,
    exchanger: Arc<ScriptedExchanger>,
    events: RecordingNotifier,
    dir: TempDir,
}

fn fixture_with(exchanger: ScriptedExchanger) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let credentials = Arc::new(EnvFileCredentialStore::new(
        dir.path().join(".env"),
        dir.path().join("auth_data"),
    ));
    let exchanger = Arc::new(exchanger);
    let events = RecordingNotifier::new();
    let auth = Arc::new(AuthService::new(
        AuthSettings::new("kitekey", TradingMode::Paper, "http://localhost:8080/postback"),
        exchanger.clone(),
        credentials.clone(),
        events.registry(),
    ));
    let state = ServerState::new(
        Arc::clone(&auth),
        Arc::new(StubRuntime::new(TradingMode::Paper)),
        Some(Arc::new(MemoryStore::new())),
    )
    .with_clock(market_hours);
    Fixture {
        app: router(Arc::new(state)),
        auth,
        credentials,
        exchanger,
        events,
        dir,
    }
}

fn fixture() -> Fixture {
    fixture_with(ScriptedExchanger::granting(ACCESS_TOKEN))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, location, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, _, body) = get(app, uri).await;
    (status, serde_json::from_str(&body).unwrap())
}

#[tokio::test]
async fn generate_returns_login_link_with_redirect_params() {
    let f = fixture();
    let (status, body) = get_json(&f.app, "/auth/generate?state=abc123").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "abc123");
    assert_eq!(body["postback_url"], "http://localhost:8080/postback");
    let login_url = body["login_url"].as_str().unwrap();
    assert!(login_url.starts_with("https://kite.zerodha.com/connect/login?"));
    assert!(login_url.contains("api_key=kitekey"));
    assert!(login_url.contains("v=3"));
    assert!(login_url.contains("redirect_params=state%3Dabc123"));

    let expires: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(body["expires_at"].clone()).unwrap();
    assert_eq!(expires, market_hours() + Duration::seconds(300));
    assert_eq!(
        f.events.count(|e| matches!(e, Event::AuthLoginRequested(_))),
        1
    );
}

#[tokio::test]
async fn postback_saves_token_and_redirects_to_success() {
    let f = fixture();
    get(&f.app, "/auth/generate?state=abc123").await;

    let (status, location, _) = get(
        &f.app,
        "/postback?status=success&request_token=req_token_1&state=abc123",
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/success?state=abc123"));
    assert_eq!(f.exchanger.calls(), vec!["req_token_1".to_string()]);

    let env = std::fs::read_to_string(f.dir.path().join(".env")).unwrap();
    assert!(env.contains(&format!("ACCESS_TOKEN={ACCESS_TOKEN}")));
    assert!(env.contains("ACCESS_TOKEN_CREATED_AT="));

    let view = token_view(f.credentials.as_ref(), market_hours());
    assert!(view.valid);
    assert_eq!(view.preview.as_deref(), Some("abcdefgh..."));

    let archives = std::fs::read_dir(f.dir.path().join("auth_data")).unwrap().count();
    assert_eq!(archives, 1);

    let (status, _, page) = get(&f.app, "/success?state=abc123").await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("Authentication successful"));
    assert!(!page.contains(ACCESS_TOKEN));
    assert_eq!(f.events.count(|e| matches!(e, Event::AuthCompleted(_))), 1);
}

#[tokio::test]
async fn replayed_postback_is_rejected() {
    let f = fixture();
    get(&f.app, "/auth/generate?state=abc123").await;
    let uri = "/postback?status=success&request_token=req_token_1&state=abc123";
    get(&f.app, uri).await;

    let (status, body) = get_json(&f.app, uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "Session already processed");
    assert_eq!(f.exchanger.calls().len(), 1);
}

#[tokio::test]
async fn postback_validation_errors() {
    let f = fixture();

    let (status, body) = get_json(&f.app, "/postback?state=abc123").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing state or request_token");

    let (status, body) = get_json(&f.app, "/postback?request_token=req_token_1&state=nope").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid authentication session");

    get(&f.app, "/auth/generate?state=abc123").await;
    let (status, body) = get_json(
        &f.app,
        "/postback?status=cancelled&request_token=req_token_1&state=abc123",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request token");
    assert!(f.exchanger.calls().is_empty());
    assert_eq!(f.events.count(|e| matches!(e, Event::AuthFailed { .. })), 1);
}

#[tokio::test]
async fn failed_exchange_is_shown_on_success_page() {
    let f = fixture_with(ScriptedExchanger::failing("Token is invalid or has expired."));
    get(&f.app, "/auth/generate?state=abc123").await;

    let (status, body) = get_json(
        &f.app,
        "/postback?status=success&request_token=req_token_1&state=abc123",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Token exchange failed"));
    assert!(!f.dir.path().join(".env").exists());

    let (_, _, page) = get(&f.app, "/success?state=abc123").await;
    assert!(page.contains("Token is invalid or has expired."));
}

#[tokio::test]
async fn expired_login_link_is_refused() {
    let f = fixture();
    f.auth.generate(Some("old"), market_hours() - Duration::minutes(10));

    let (status, body) =
        get_json(&f.app, "/postback?request_token=req_token_1&state=old").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Session expired");
    assert!(f.exchanger.calls().is_empty());
}

#[tokio::test]
async fn status_endpoints_report_runtime_state() {
    let f = fixture();
    get(&f.app, "/auth/generate?state=abc123").await;

    let (status, health) = get_json(&f.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["mode"], "paper");
    assert_eq!(health["pending_auths"], 1);
    assert_eq!(health["token_valid"], false);

    let (_, mode) = get_json(&f.app, "/mode").await;
    assert_eq!(mode["mode"], "paper");

    let (_, pending) = get_json(&f.app, "/pending").await;
    let pending = pending.as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["state"], "abc123");
    assert!(pending[0].get("login_url").is_none());

    let (status, body) = get_json(&f.app, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["auth"]["pending"], 1);
    assert!(body["risk"]["max_daily_trades"].is_number());
    assert!(body["session"].is_null());

    let (status, _, page) = get(&f.app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("<html") || page.contains("<!DOCTYPE"));
}
