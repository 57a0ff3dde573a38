//! Pending login sessions and the postback handshake.
//!
//! A login starts with [`AuthService::generate`], which registers a random
//! `state` and returns the broker login URL. The broker redirects the
//! browser to the postback endpoint with a one-time request token, which
//! [`AuthService::handle_postback`] exchanges for an access token.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::RngCore;
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::domain::calendar::token_expiry;
use crate::domain::{mask_secret, AuthStatus, PendingAuth, TradingMode};
use crate::error::{AuthError, Error};
use crate::port::inbound::runtime::TokenView;
use crate::port::outbound::broker::SessionExchanger;
use crate::port::outbound::credential::{AuthArchive, CredentialStore};
use crate::port::outbound::notifier::{AuthEvent, Event, LoginEvent, NotifierRegistry};

/// Kite Connect login page.
pub const KITE_LOGIN_URL: &str = "https://kite.zerodha.com/connect/login";

const MIN_REQUEST_TOKEN_LEN: usize = 8;

/// Called with each newly issued access token.
pub type TokenListener = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub api_key: String,
    pub mode: TradingMode,
    /// Absolute URL of the postback endpoint.
    pub postback_url: String,
    /// Lifetime of a pending login.
    pub timeout: Duration,
    pub login_url: String,
}

impl AuthSettings {
    #[must_use]
    pub fn new(api_key: impl Into<String>, mode: TradingMode, postback_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            mode,
            postback_url: postback_url.into(),
            timeout: Duration::seconds(300),
            login_url: KITE_LOGIN_URL.to_string(),
        }
    }
}

/// Result of a successful postback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthOutcome {
    pub state: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub mode: TradingMode,
    pub token_preview: String,
    pub expires_at: DateTime<Utc>,
}

/// Session counts by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthSummary {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub expired: usize,
}

pub struct AuthService {
    settings: AuthSettings,
    sessions: Mutex<HashMap<String, PendingAuth>>,
    exchanger: Arc<dyn SessionExchanger>,
    credentials: Arc<dyn CredentialStore>,
    notifier: Arc<NotifierRegistry>,
    listener: Option<TokenListener>,
}

impl AuthService {
    pub fn new(
        settings: AuthSettings,
        exchanger: Arc<dyn SessionExchanger>,
        credentials: Arc<dyn CredentialStore>,
        notifier: Arc<NotifierRegistry>,
    ) -> Self {
        Self {
            settings,
            sessions: Mutex::new(HashMap::new()),
            exchanger,
            credentials,
            notifier,
            listener: None,
        }
    }

    /// Receive every access token issued through this service.
    #[must_use]
    pub fn with_token_listener(mut self, listener: TokenListener) -> Self {
        self.listener = Some(listener);
        self
    }

    #[must_use]
    pub const fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    #[must_use]
    pub const fn mode(&self) -> TradingMode {
        self.settings.mode
    }

    /// Register a pending login and build its URLs.
    ///
    /// A missing or blank `state` is replaced with a random token. Reusing
    /// a state replaces the earlier session.
    pub fn generate(&self, state: Option<&str>, now: DateTime<Utc>) -> PendingAuth {
        let state = match state.map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => random_state(),
        };

        let pending = PendingAuth {
            login_url: self.login_url(&state),
            postback_url: self.settings.postback_url.clone(),
            state: state.clone(),
            created_at: now,
            expires_at: now + self.settings.timeout,
            status: AuthStatus::Pending,
            mode: self.settings.mode,
            completed_at: None,
            error: None,
        };
        self.sessions.lock().insert(state.clone(), pending.clone());

        info!(state = %state, expires_at = %pending.expires_at, "Login session created");
        self.notifier.notify_all(Event::AuthLoginRequested(LoginEvent {
            state,
            login_url: pending.login_url.clone(),
            expires_at: pending.expires_at,
        }));
        pending
    }

    fn login_url(&self, state: &str) -> String {
        let redirect = format!("state={state}");
        match Url::parse(&self.settings.login_url) {
            Ok(mut url) => {
                url.query_pairs_mut()
                    .append_pair("api_key", &self.settings.api_key)
                    .append_pair("v", "3")
                    .append_pair("redirect_params", &redirect);
                url.into()
            }
            Err(_) => format!(
                "{}?api_key={}&v=3",
                self.settings.login_url, self.settings.api_key
            ),
        }
    }

    /// Exchange the request token for a postback.
    ///
    /// `status` is the broker's own login status; anything other than
    /// `success` fails the session.
    ///
    /// # Errors
    ///
    /// See [`AuthError`]; every failure is safe to show to the browser.
    pub async fn handle_postback(
        &self,
        state: &str,
        request_token: &str,
        status: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AuthOutcome, AuthError> {
        let session = {
            let mut sessions = self.sessions.lock();
            let Some(session) = sessions.get_mut(state) else {
                warn!(state = %state, "Postback for unknown state");
                return Err(AuthError::UnknownSession);
            };
            if !session.is_pending() {
                return Err(AuthError::AlreadyProcessed);
            }
            if session.is_expired(now) {
                if let Some(mut expired) = sessions.remove(state) {
                    expired.status = AuthStatus::Expired;
                    drop(sessions);
                    self.archive(&expired, now, None, None);
                }
                warn!(state = %state, "Postback for expired session");
                return Err(AuthError::Expired);
            }
            // A short token leaves the session pending for a retry.
            let refused = status.is_some_and(|s| s != "success");
            if !refused && request_token.trim().len() < MIN_REQUEST_TOKEN_LEN {
                return Err(AuthError::InvalidRequestToken);
            }
            // Claim the session so a concurrent postback sees it as processed.
            session.status = AuthStatus::Processing;
            session.clone()
        };

        if let Some(status) = status.filter(|s| *s != "success") {
            let reason = format!("login status {status}");
            self.fail(&session, &reason, now);
            return Err(AuthError::InvalidRequestToken);
        }

        let grant = match self.exchanger.exchange(request_token).await {
            Ok(grant) => grant,
            Err(e) => {
                let reason = e.to_string();
                self.fail(&session, &reason, now);
                return Err(AuthError::ExchangeFailed(reason));
            }
        };

        if let Err(e) = self.credentials.save(&grant.access_token, now) {
            let reason = e.to_string();
            self.fail(&session, &reason, now);
            return Err(match e {
                Error::Auth(auth) => auth,
                _ => AuthError::ExchangeFailed(reason),
            });
        }
        if let Some(listener) = &self.listener {
            listener(&grant.access_token);
        }

        let completed = {
            let mut sessions = self.sessions.lock();
            let entry = sessions.entry(state.to_string()).or_insert(session);
            entry.complete(now);
            entry.clone()
        };

        let outcome = AuthOutcome {
            state: state.to_string(),
            user_id: grant.user_id.clone(),
            user_name: grant.user_name.clone(),
            mode: self.settings.mode,
            token_preview: mask_secret(&grant.access_token),
            expires_at: token_expiry(now),
        };
        self.archive(
            &completed,
            now,
            Some(grant.user_id.clone()),
            Some(outcome.token_preview.clone()),
        );

        info!(
            state = %state,
            user_id = %outcome.user_id,
            token = %outcome.token_preview,
            "Authentication completed"
        );
        self.notifier.notify_all(Event::AuthCompleted(AuthEvent {
            user_id: outcome.user_id.clone(),
            mode: outcome.mode,
            token_preview: outcome.token_preview.clone(),
            expires_at: outcome.expires_at,
        }));
        Ok(outcome)
    }

    fn fail(&self, session: &PendingAuth, reason: &str, now: DateTime<Utc>) {
        let failed = {
            let mut sessions = self.sessions.lock();
            let entry = sessions
                .entry(session.state.clone())
                .or_insert_with(|| session.clone());
            entry.fail(now, reason);
            entry.clone()
        };
        warn!(state = %session.state, reason = %reason, "Authentication failed");
        self.archive(&failed, now, None, None);
        self.notifier.notify_all(Event::AuthFailed {
            state: session.state.clone(),
            reason: reason.to_string(),
        });
    }

    fn archive(
        &self,
        session: &PendingAuth,
        now: DateTime<Utc>,
        user_id: Option<String>,
        token_preview: Option<String>,
    ) {
        let record = AuthArchive {
            state: session.state.clone(),
            mode: session.mode,
            status: session.status,
            created_at: session.created_at,
            finished_at: now,
            user_id,
            token_preview,
            error: session.error.clone(),
        };
        if let Err(e) = self.credentials.archive(&record) {
            warn!(error = %e, state = %session.state, "Failed to archive auth session");
        }
    }

    /// Drop expired pending sessions and return how many were removed.
    pub fn cleanup_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, s| !(s.is_pending() && s.is_expired(now)));
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, "Expired login sessions removed");
        }
        removed
    }

    /// Sessions still waiting for a postback, oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<PendingAuth> {
        let mut pending: Vec<PendingAuth> = self
            .sessions
            .lock()
            .values()
            .filter(|s| s.is_pending())
            .cloned()
            .collect();
        pending.sort_by_key(|s| s.created_at);
        pending
    }

    #[must_use]
    pub fn session(&self, state: &str) -> Option<PendingAuth> {
        self.sessions.lock().get(state).cloned()
    }

    #[must_use]
    pub fn status_summary(&self) -> AuthSummary {
        let sessions = self.sessions.lock();
        let mut summary = AuthSummary {
            total: sessions.len(),
            ..AuthSummary::default()
        };
        for s in sessions.values() {
            match s.status {
                AuthStatus::Pending => summary.pending += 1,
                AuthStatus::Processing => summary.processing += 1,
                AuthStatus::Completed => summary.completed += 1,
                AuthStatus::Failed => summary.failed += 1,
                AuthStatus::Expired => summary.expired += 1,
            }
        }
        summary
    }

    /// Presence and validity of the stored access token.
    #[must_use]
    pub fn token_view(&self, now: DateTime<Utc>) -> TokenView {
        token_view(self.credentials.as_ref(), now)
    }
}

/// Presence and validity of the token in `credentials`.
///
/// A token without an issue time is assumed valid.
#[must_use]
pub fn token_view(credentials: &dyn CredentialStore, now: DateTime<Utc>) -> TokenView {
    let stored = match credentials.load() {
        Ok(stored) => stored,
        Err(e) => {
            warn!(error = %e, "Failed to read stored token");
            None
        }
    };
    match stored {
        Some(token) if !token.access_token.is_empty() => {
            let expires_at = token.issued_at.map(token_expiry);
            TokenView {
                present: true,
                preview: Some(mask_secret(&token.access_token)),
                issued_at: token.issued_at,
                expires_at,
                valid: expires_at.map_or(true, |exp| now < exp),
            }
        }
        _ => TokenView {
            present: false,
            preview: None,
            issued_at: None,
            expires_at: None,
            valid: false,
        },
    }
}

fn random_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
