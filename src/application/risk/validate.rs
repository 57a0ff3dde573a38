//! Static validation of risk limits.

use std::fmt;

use crate::application::state::RiskLimits;
use crate::domain::TradingMode;
use rust_decimal::Decimal;

/// Which credentials are available to the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CredentialPresence {
    pub api_key: bool,
    pub access_token: bool,
}

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskIssue {
    pub field: &'static str,
    pub reason: &'static str,
}

impl fmt::Display for RiskIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

const fn issue(field: &'static str, reason: &'static str) -> RiskIssue {
    RiskIssue { field, reason }
}

/// Rules on the limits themselves, independent of credentials.
#[must_use]
pub fn validate_limits(limits: &RiskLimits, mode: TradingMode) -> Vec<RiskIssue> {
    let mut issues = Vec::new();
    if limits.max_daily_trades < 1 {
        issues.push(issue("risk.max_daily_trades", "must be >= 1"));
    }
    if limits.max_consecutive_losses < 1 {
        issues.push(issue("risk.max_consecutive_losses", "must be >= 1"));
    }
    if limits.max_daily_loss >= Decimal::ZERO {
        issues.push(issue("risk.max_daily_loss", "must be negative"));
    }
    if limits.max_exposure < limits.min_balance_per_trade {
        issues.push(issue(
            "risk.max_exposure",
            "must be >= risk.min_balance_per_trade",
        ));
    }
    if limits.min_lot_size < 1 {
        issues.push(issue("risk.min_lot_size", "must be >= 1"));
    }
    if !mode.is_live() && limits.virtual_balance < limits.min_balance_per_trade {
        issues.push(issue(
            "risk.virtual_balance",
            "must be >= risk.min_balance_per_trade",
        ));
    }
    issues
}

/// Limit rules plus the credentials live trading needs.
#[must_use]
pub fn validate(
    limits: &RiskLimits,
    mode: TradingMode,
    credentials: CredentialPresence,
) -> Vec<RiskIssue> {
    let mut issues = validate_limits(limits, mode);
    if mode.is_live() {
        if !credentials.api_key {
            issues.push(issue("ZAPI_KEY", "required for live trading"));
        }
        if !credentials.access_token {
            issues.push(issue("ACCESS_TOKEN", "required for live trading"));
        }
    }
    issues
}
