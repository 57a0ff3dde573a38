//! Runtime control port for operator-facing adapters.
//!
//! Keeps control surfaces (the Telegram bot) decoupled from the concrete
//! application services behind them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::money::{Price, Quantity};
use crate::domain::{Position, TradingMode};
use crate::error::RiskError;

/// Snapshot of the limits that can be changed from chat.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeRiskLimits {
    pub max_daily_trades: u32,
    pub max_consecutive_losses: u32,
    /// Negative rupee amount.
    pub max_daily_loss: Decimal,
    pub max_exposure: Decimal,
    pub lot_size: Quantity,
}

/// Runtime-adjustable risk limit fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeRiskLimitKind {
    MaxTrades,
    MaxLosses,
    MaxLoss,
    MaxExposure,
    LotSize,
}

impl RuntimeRiskLimitKind {
    /// Field name as typed in `/set_risk`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MaxTrades => "max_trades",
            Self::MaxLosses => "max_losses",
            Self::MaxLoss => "max_loss",
            Self::MaxExposure => "max_exposure",
            Self::LotSize => "lot_size",
        }
    }
}

/// Error returned when a runtime risk limit update is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeRiskLimitUpdateError {
    reason: &'static str,
}

impl RuntimeRiskLimitUpdateError {
    #[must_use]
    pub const fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

impl std::fmt::Display for RuntimeRiskLimitUpdateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl std::error::Error for RuntimeRiskLimitUpdateError {}

/// Counters, limits and the resulting trading permission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskStatus {
    pub mode: TradingMode,
    pub trading_allowed: bool,
    pub halted: bool,
    pub halt_reason: Option<String>,
    pub trades_today: u32,
    pub max_daily_trades: u32,
    pub remaining_trades: u32,
    pub consecutive_losses: u32,
    pub max_consecutive_losses: u32,
    pub daily_pnl: Decimal,
    pub max_daily_loss: Decimal,
    pub exposure: Decimal,
    pub max_exposure: Decimal,
    pub market_open: bool,
    pub last_reset: Option<chrono::NaiveDate>,
}

/// Overall health level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthLevel {
    Healthy,
    Degraded,
}

/// One named health check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthCheck {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthLevel,
    pub checks: Vec<HealthCheck>,
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    /// Roll individual checks up into a report.
    #[must_use]
    pub fn from_checks(checks: Vec<HealthCheck>, timestamp: DateTime<Utc>) -> Self {
        let status = if checks.iter().all(|c| c.ok) {
            HealthLevel::Healthy
        } else {
            HealthLevel::Degraded
        };
        Self {
            status,
            checks,
            timestamp,
        }
    }
}

/// Where a balance figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceOrigin {
    /// Configured virtual balance (test and paper modes).
    Virtual,
    /// Fresh value from the broker.
    Live,
    /// Broker value younger than the cache TTL.
    Cached,
    /// Broker unreachable, configured fallback used.
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BalanceView {
    pub amount: Price,
    pub origin: BalanceOrigin,
}

/// Access token presence and validity, never the token itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenView {
    pub present: bool,
    pub preview: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub valid: bool,
}

/// A freshly registered login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginLink {
    pub state: String,
    pub login_url: String,
    pub postback_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Error returned when a login cannot be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginUnavailable(pub String);

impl std::fmt::Display for LoginUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for LoginUnavailable {}

/// Mutable runtime state and operator control interface.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the command listener runs on its
/// own task.
#[async_trait]
pub trait RuntimeState: Send + Sync {
    fn mode(&self) -> TradingMode;

    fn risk_status(&self) -> RiskStatus;

    fn risk_limits(&self) -> RuntimeRiskLimits;

    /// Update a single risk limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the value fails validation.
    fn set_risk_limit(
        &self,
        kind: RuntimeRiskLimitKind,
        value: Decimal,
    ) -> Result<RuntimeRiskLimits, RuntimeRiskLimitUpdateError>;

    /// Halt new entries.
    fn pause(&self, reason: &str);

    /// Lift a halt.
    fn resume(&self);

    /// Halt, record an alert, and return the status prior to the stop.
    fn emergency_stop(&self, reason: &str) -> RiskStatus;

    /// Zero daily counters.
    ///
    /// # Errors
    ///
    /// Fails when manual reset is disabled in config.
    fn reset_risk(&self) -> Result<RiskStatus, RiskError>;

    fn health(&self) -> HealthReport;

    async fn balance(&self) -> BalanceView;

    fn token(&self) -> TokenView;

    /// Register a new login and return its link.
    ///
    /// # Errors
    ///
    /// Refused outside the login window.
    fn start_login(&self) -> Result<LoginLink, LoginUnavailable>;

    fn open_position(&self) -> Option<Position>;
}
