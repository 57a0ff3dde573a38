//! Risk management configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::state::RiskLimits;
use crate::domain::money::Quantity;

/// `[risk]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RiskConfig {
    pub max_daily_trades: u32,
    pub max_consecutive_losses: u32,
    /// Negative rupee amount.
    pub max_daily_loss: Decimal,
    /// Largest notional value of a single entry.
    pub max_exposure: Decimal,
    pub min_balance_per_trade: Decimal,
    /// Exchange lot size for SENSEX options.
    pub min_lot_size: Quantity,
    /// Balance assumed in test and paper modes.
    pub virtual_balance: Decimal,
    /// Balance assumed when the broker is unreachable in live mode.
    pub emergency_balance: Decimal,
    /// Required balance is `order value * balance_buffer`.
    pub balance_buffer: Decimal,
    pub sizing_fraction: Decimal,
    /// Allow `/risk_reset` to zero the daily counters.
    pub allow_manual_reset: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        let limits = RiskLimits::default();
        Self {
            max_daily_trades: limits.max_daily_trades,
            max_consecutive_losses: limits.max_consecutive_losses,
            max_daily_loss: limits.max_daily_loss,
            max_exposure: limits.max_exposure,
            min_balance_per_trade: limits.min_balance_per_trade,
            min_lot_size: limits.min_lot_size,
            virtual_balance: limits.virtual_balance,
            emergency_balance: limits.emergency_balance,
            balance_buffer: limits.balance_buffer,
            sizing_fraction: limits.sizing_fraction,
            allow_manual_reset: limits.allow_manual_reset,
        }
    }
}

impl From<&RiskConfig> for RiskLimits {
    fn from(config: &RiskConfig) -> Self {
        Self {
            max_daily_trades: config.max_daily_trades,
            max_consecutive_losses: config.max_consecutive_losses,
            max_daily_loss: config.max_daily_loss,
            max_exposure: config.max_exposure,
            min_balance_per_trade: config.min_balance_per_trade,
            min_lot_size: config.min_lot_size,
            virtual_balance: config.virtual_balance,
            emergency_balance: config.emergency_balance,
            balance_buffer: config.balance_buffer,
            sizing_fraction: config.sizing_fraction,
            allow_manual_reset: config.allow_manual_reset,
        }
    }
}
