//! Persistence port for positions, sessions, alerts and risk state.
//!
//! Calls are synchronous; the SQLite adapter serializes writes through a
//! small connection pool and each call is short.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::{Position, TradingSession};
use crate::error::Result;

/// Alert categories written to `system_alerts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AlertKind {
    RiskViolation,
    EmergencyStop,
    ManualRiskReset,
    TradingHalted,
    Error,
}

impl AlertKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RiskViolation => "RISK_VIOLATION",
            Self::EmergencyStop => "EMERGENCY_STOP",
            Self::ManualRiskReset => "MANUAL_RISK_RESET",
            Self::TradingHalted => "TRADING_HALTED",
            Self::Error => "ERROR",
        }
    }
}

/// A row of `system_alerts`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRecord {
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub alert_type: String,
    pub message: String,
    pub metadata: serde_json::Value,
}

impl AlertRecord {
    #[must_use]
    pub fn new(
        kind: AlertKind,
        message: impl Into<String>,
        metadata: serde_json::Value,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            timestamp: at,
            alert_type: kind.as_str().to_string(),
            message: message.into(),
            metadata,
        }
    }
}

/// Durable storage for trading records.
pub trait TradeStore: Send + Sync {
    /// Insert a position and return its row id.
    fn save_position(&self, position: &Position, trade_date: NaiveDate) -> Result<i64>;

    /// Update a persisted position by id.
    fn update_position(&self, position: &Position) -> Result<()>;

    /// Positions whose trade date is `date`, oldest first.
    fn positions_for_date(&self, date: NaiveDate) -> Result<Vec<Position>>;

    fn open_positions(&self) -> Result<Vec<Position>>;

    /// Insert or replace the session for its date.
    fn save_session(&self, session: &TradingSession) -> Result<()>;

    fn session_for_date(&self, date: NaiveDate) -> Result<Option<TradingSession>>;

    fn save_alert(&self, alert: &AlertRecord) -> Result<i64>;

    /// Alerts raised on `date` (IST), optionally restricted to one type.
    fn alerts_for_date(&self, date: NaiveDate, alert_type: Option<&str>)
        -> Result<Vec<AlertRecord>>;

    fn last_risk_reset(&self) -> Result<Option<NaiveDate>>;

    fn set_last_risk_reset(&self, date: NaiveDate) -> Result<()>;

    /// Cheap round trip to verify the database is reachable.
    fn ping(&self) -> Result<()>;
}
