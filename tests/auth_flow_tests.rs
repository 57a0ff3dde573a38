//! Login flow against the env-file credential store.

mod harness;

use std::fs;
use std::sync::{Arc, Mutex};

use harness::recording_notifier::RecordingNotifier;
use sensexbot::adapter::outbound::credential::EnvFileCredentialStore;
use sensexbot::application::auth::{token_view, AuthService, AuthSettings};
use sensexbot::domain::TradingMode;
use sensexbot::error::AuthError;
use sensexbot::port::outbound::credential::CredentialStore;
use sensexbot::port::outbound::notifier::Event;
use sensexbot::testkit::auth::ScriptedExchanger;
use sensexbot::testkit::domain::market_hours;
use tempfile::TempDir;

const ACCESS_TOKEN: &str = "Zx9Yw8Vu7Ts6Rq5Po4Nm3Lk2Ji1Hg0Fe";

fn service(dir: &TempDir, exchanger: ScriptedExchanger, events: &RecordingNotifier) -> AuthService {
    AuthService::new(
        AuthSettings::new("kitekey", TradingMode::Live, "http://localhost:8080/postback"),
        Arc::new(exchanger),
        Arc::new(EnvFileCredentialStore::new(
            dir.path().join(".env"),
            dir.path().join("auth_data"),
        )),
        events.registry(),
    )
}

#[tokio::test]
async fn login_replaces_the_token_and_keeps_other_secrets() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(".env"),
        "ZAPI_KEY=kitekey\nZAPI_SECRET=kitesecret\nACCESS_TOKEN=stale\n",
    )
    .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let events = RecordingNotifier::new();
    let auth = service(&dir, ScriptedExchanger::granting(ACCESS_TOKEN), &events)
        .with_token_listener(Box::new(move |token| {
            sink.lock().unwrap().push(token.to_string());
        }));

    let now = market_hours();
    auth.generate(Some("s1"), now);
    let outcome = auth
        .handle_postback("s1", "request_token_1", Some("success"), now)
        .await
        .unwrap();
    assert_eq!(outcome.user_id, "AB1234");
    assert_eq!(outcome.mode, TradingMode::Live);
    assert_eq!(outcome.token_preview, "Zx9Yw8Vu...");
    assert_eq!(*seen.lock().unwrap(), vec![ACCESS_TOKEN.to_string()]);

    let env = fs::read_to_string(dir.path().join(".env")).unwrap();
    assert!(env.contains("ZAPI_KEY=kitekey"));
    assert!(env.contains("ZAPI_SECRET=kitesecret"));
    assert!(!env.contains("ACCESS_TOKEN=stale"));
    assert_eq!(env.matches("ACCESS_TOKEN=").count(), 1);

    // A fresh store, as after a restart, reads the same token back.
    let reopened = EnvFileCredentialStore::new(dir.path().join(".env"), dir.path().join("auth_data"));
    let stored = reopened.load().unwrap().unwrap();
    assert_eq!(stored.access_token, ACCESS_TOKEN);
    assert_eq!(stored.issued_at, Some(now));
    let view = token_view(&reopened, now);
    assert!(view.valid);
    assert!(view.expires_at.is_some_and(|exp| exp > now));

    let archive = fs::read_dir(dir.path().join("auth_data"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .next()
        .unwrap();
    assert!(archive.starts_with("auth_live_completed_"));
    assert_eq!(events.count(|e| matches!(e, Event::AuthCompleted(_))), 1);
}

#[tokio::test]
async fn malformed_access_token_is_not_saved() {
    let dir = tempfile::tempdir().unwrap();
    let events = RecordingNotifier::new();
    let auth = service(&dir, ScriptedExchanger::granting("short_token"), &events);

    let now = market_hours();
    auth.generate(Some("s1"), now);
    let err = auth
        .handle_postback("s1", "request_token_1", None, now)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidAccessToken(_)));
    assert!(!dir.path().join(".env").exists());
    assert_eq!(events.count(|e| matches!(e, Event::AuthFailed { .. })), 1);

    let archive = fs::read_dir(dir.path().join("auth_data"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .next()
        .unwrap();
    assert!(archive.starts_with("auth_live_failed_"));
}

#[tokio::test]
async fn short_request_token_is_refused_before_exchange() {
    let dir = tempfile::tempdir().unwrap();
    let events = RecordingNotifier::new();
    let exchanger = Arc::new(ScriptedExchanger::granting(ACCESS_TOKEN));
    let auth = AuthService::new(
        AuthSettings::new("kitekey", TradingMode::Paper, "http://localhost:8080/postback"),
        exchanger.clone(),
        Arc::new(EnvFileCredentialStore::new(
            dir.path().join(".env"),
            dir.path().join("auth_data"),
        )),
        events.registry(),
    );

    auth.generate(Some("s1"), market_hours());
    let err = auth
        .handle_postback("s1", "abc", Some("success"), market_hours())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidRequestToken));
    assert!(exchanger.calls().is_empty());

    // The session stays pending so a correct retry still works.
    auth.handle_postback("s1", "request_token_1", Some("success"), market_hours())
        .await
        .unwrap();
    assert_eq!(exchanger.calls().len(), 1);
}
