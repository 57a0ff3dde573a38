//! Route handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{Html, Redirect};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use url::form_urlencoded;

use crate::application::auth::AuthSummary;
use crate::domain::calendar::ist_date;
use crate::domain::{PendingAuth, TradingMode, TradingSession};
use crate::port::inbound::runtime::RiskStatus;

use super::error::ApiError;
use super::page::{self, DashboardView};
use super::server::ServerState;

type AppState = State<Arc<ServerState>>;

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub mode: TradingMode,
    pub pending_auths: usize,
    pub token_valid: bool,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub market_open: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub risk: RiskStatus,
    pub session: Option<TradingSession>,
    pub auth: AuthSummary,
    pub timestamp: DateTime<Utc>,
}

/// A pending login without its login URL.
#[derive(Debug, Serialize)]
pub struct PendingBody {
    pub state: String,
    pub mode: TradingMode,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&PendingAuth> for PendingBody {
    fn from(p: &PendingAuth) -> Self {
        Self {
            state: p.state.clone(),
            mode: p.mode,
            created_at: p.created_at,
            expires_at: p.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateBody {
    pub state: String,
    pub login_url: String,
    pub postback_url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateParams {
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PostbackParams {
    pub status: Option<String>,
    pub request_token: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuccessParams {
    pub state: Option<String>,
}

pub async fn dashboard(State(state): AppState) -> Html<String> {
    let now = state.now();
    let status = state.runtime.risk_status();
    let view = DashboardView {
        mode: state.runtime.mode(),
        pending: state.auth.pending(),
        token: state.runtime.token(),
        trading_allowed: status.trading_allowed,
        market_open: status.market_open,
        now,
    };
    Html(page::dashboard(&view))
}

pub async fn health(State(state): AppState) -> Json<HealthBody> {
    let token = state.runtime.token();
    Json(HealthBody {
        status: "ok",
        mode: state.runtime.mode(),
        pending_auths: state.auth.pending().len(),
        token_valid: token.valid,
        token_expires_at: token.expires_at,
        market_open: state.runtime.risk_status().market_open,
        timestamp: state.now(),
    })
}

pub async fn status(State(state): AppState) -> Result<Json<StatusBody>, ApiError> {
    let now = state.now();
    let session = match &state.store {
        Some(store) => store.session_for_date(ist_date(now))?,
        None => None,
    };
    Ok(Json(StatusBody {
        risk: state.runtime.risk_status(),
        session,
        auth: state.auth.status_summary(),
        timestamp: now,
    }))
}

pub async fn mode(State(state): AppState) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "mode": state.runtime.mode() }))
}

pub async fn pending(State(state): AppState) -> Json<Vec<PendingBody>> {
    Json(state.auth.pending().iter().map(PendingBody::from).collect())
}

pub async fn generate(
    State(state): AppState,
    Query(params): Query<GenerateParams>,
) -> Json<GenerateBody> {
    let pending = state.auth.generate(params.state.as_deref(), state.now());
    Json(GenerateBody {
        state: pending.state,
        login_url: pending.login_url,
        postback_url: pending.postback_url,
        expires_at: pending.expires_at,
    })
}

pub async fn postback(
    State(state): AppState,
    Query(params): Query<PostbackParams>,
) -> Result<Redirect, ApiError> {
    let (Some(login_state), Some(request_token)) = (params.state, params.request_token) else {
        return Err(ApiError::BadRequest(
            "Missing state or request_token".to_string(),
        ));
    };

    let outcome = state
        .auth
        .handle_postback(
            &login_state,
            &request_token,
            params.status.as_deref(),
            state.now(),
        )
        .await?;

    info!(state = %outcome.state, user_id = %outcome.user_id, "Postback accepted");
    let encoded: String = form_urlencoded::byte_serialize(outcome.state.as_bytes()).collect();
    Ok(Redirect::to(&format!("/success?state={encoded}")))
}

pub async fn success(
    State(state): AppState,
    Query(params): Query<SuccessParams>,
) -> Html<String> {
    let session = params.state.as_deref().and_then(|s| state.auth.session(s));
    Html(page::success(session.as_ref()))
}
