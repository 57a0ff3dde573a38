//! Operator-facing runtime over the risk manager and login service.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::application::auth::{token_view, AuthService};
use crate::application::risk::{CredentialPresence, RiskManager};
use crate::domain::{Position, TradingMode};
use crate::error::RiskError;
use crate::port::inbound::runtime::{
    BalanceView, HealthReport, LoginLink, LoginUnavailable, RiskStatus, RuntimeRiskLimitKind,
    RuntimeRiskLimitUpdateError, RuntimeRiskLimits, RuntimeState, TokenView,
};
use crate::port::outbound::credential::CredentialStore;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// [`RuntimeState`] for the running bot.
pub struct BotRuntime {
    risk: Arc<RiskManager>,
    auth: Option<Arc<AuthService>>,
    credentials: Arc<dyn CredentialStore>,
    api_key_present: bool,
    clock: Clock,
}

impl BotRuntime {
    pub fn new(
        risk: Arc<RiskManager>,
        auth: Option<Arc<AuthService>>,
        credentials: Arc<dyn CredentialStore>,
        api_key_present: bool,
    ) -> Self {
        Self {
            risk,
            auth,
            credentials,
            api_key_present,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

#[async_trait]
impl RuntimeState for BotRuntime {
    fn mode(&self) -> TradingMode {
        self.risk.state().mode()
    }

    fn risk_status(&self) -> RiskStatus {
        self.risk.risk_status(self.now())
    }

    fn risk_limits(&self) -> RuntimeRiskLimits {
        self.risk.state().runtime_limits()
    }

    fn set_risk_limit(
        &self,
        kind: RuntimeRiskLimitKind,
        value: Decimal,
    ) -> Result<RuntimeRiskLimits, RuntimeRiskLimitUpdateError> {
        let updated = self.risk.state().set_risk_limit(kind, value)?;
        tracing::info!(field = kind.as_str(), value = %value, "Risk limit updated");
        Ok(updated)
    }

    fn pause(&self, reason: &str) {
        self.risk.pause(reason);
    }

    fn resume(&self) {
        self.risk.resume();
    }

    fn emergency_stop(&self, reason: &str) -> RiskStatus {
        self.risk.emergency_stop(reason, self.now())
    }

    fn reset_risk(&self) -> Result<RiskStatus, RiskError> {
        self.risk.manual_reset(self.now())
    }

    fn health(&self) -> HealthReport {
        let presence = CredentialPresence {
            api_key: self.api_key_present,
            access_token: self.token().present,
        };
        self.risk.health_check(presence, self.now())
    }

    async fn balance(&self) -> BalanceView {
        self.risk.balance().available().await
    }

    fn token(&self) -> TokenView {
        token_view(self.credentials.as_ref(), self.now())
    }

    fn start_login(&self) -> Result<LoginLink, LoginUnavailable> {
        let Some(auth) = &self.auth else {
            return Err(LoginUnavailable("ZAPI_KEY is not configured".to_string()));
        };
        let now = self.now();
        if !self.risk.calendar().is_login_window(now) {
            return Err(LoginUnavailable(
                "Login is only available 09:00-15:30 IST on trading days".to_string(),
            ));
        }
        let pending = auth.generate(None, now);
        Ok(LoginLink {
            state: pending.state,
            login_url: pending.login_url,
            postback_url: pending.postback_url,
            expires_at: pending.expires_at,
        })
    }

    fn open_position(&self) -> Option<Position> {
        self.risk.state().open_position()
    }
}
