//! Shared application state.
//!
//! Risk limits, daily counters, the halt flag and the currently open
//! position. Every lock here is held only for the duration of a field
//! update; none is held across an await point.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::money::{Price, Quantity};
use crate::domain::{Position, TradingMode};
use crate::port::inbound::runtime::{
    RuntimeRiskLimitKind, RuntimeRiskLimitUpdateError, RuntimeRiskLimits,
};

/// Risk limits configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskLimits {
    pub max_daily_trades: u32,
    pub max_consecutive_losses: u32,
    /// Negative rupee amount; trading stops once daily P&L falls below it.
    pub max_daily_loss: Decimal,
    /// Largest notional value of a single entry.
    pub max_exposure: Decimal,
    pub min_balance_per_trade: Decimal,
    /// Exchange lot size; live quantities are rounded down to a multiple.
    pub min_lot_size: Quantity,
    /// Balance assumed in test and paper modes.
    pub virtual_balance: Decimal,
    /// Balance assumed when the broker cannot be reached.
    pub emergency_balance: Decimal,
    /// Multiplier applied to the order value before comparing with balance.
    pub balance_buffer: Decimal,
    /// Share of the live balance usable when sizing down.
    pub sizing_fraction: Decimal,
    pub allow_manual_reset: bool,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_daily_trades: 3,
            max_consecutive_losses: 2,
            max_daily_loss: Decimal::from(-25_000),
            max_exposure: Decimal::from(100_000),
            min_balance_per_trade: Decimal::from(50_000),
            min_lot_size: 20,
            virtual_balance: Decimal::from(100_000),
            emergency_balance: Decimal::from(50_000),
            balance_buffer: Decimal::new(11, 1),
            sizing_fraction: Decimal::new(9, 1),
            allow_manual_reset: false,
        }
    }
}

impl RiskLimits {
    fn to_runtime(&self) -> RuntimeRiskLimits {
        RuntimeRiskLimits {
            max_daily_trades: self.max_daily_trades,
            max_consecutive_losses: self.max_consecutive_losses,
            max_daily_loss: self.max_daily_loss,
            max_exposure: self.max_exposure,
            lot_size: self.min_lot_size,
        }
    }
}

/// Daily risk counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskCounters {
    pub trades_today: u32,
    pub consecutive_losses: u32,
    pub daily_pnl: Price,
    pub exposure: Price,
    pub last_reset_date: Option<NaiveDate>,
}

fn positive_integer(value: Decimal) -> Result<u32, RuntimeRiskLimitUpdateError> {
    if value.fract() != Decimal::ZERO {
        return Err(RuntimeRiskLimitUpdateError::new("value must be a whole number"));
    }
    match value.to_u32() {
        Some(v) if v >= 1 => Ok(v),
        _ => Err(RuntimeRiskLimitUpdateError::new("value must be at least 1")),
    }
}

/// Shared application state accessible by all services.
pub struct AppState {
    mode: TradingMode,
    risk_limits: RwLock<RiskLimits>,
    counters: Mutex<RiskCounters>,
    /// When true, no new entries.
    halted: AtomicBool,
    halt_reason: RwLock<Option<String>>,
    open_position: RwLock<Option<Position>>,
}

impl AppState {
    #[must_use]
    pub fn new(mode: TradingMode, risk_limits: RiskLimits) -> Self {
        Self {
            mode,
            risk_limits: RwLock::new(risk_limits),
            counters: Mutex::new(RiskCounters::default()),
            halted: AtomicBool::new(false),
            halt_reason: RwLock::new(None),
            open_position: RwLock::new(None),
        }
    }

    #[must_use]
    pub const fn mode(&self) -> TradingMode {
        self.mode
    }

    pub fn risk_limits(&self) -> RiskLimits {
        self.risk_limits.read().clone()
    }

    pub fn runtime_limits(&self) -> RuntimeRiskLimits {
        self.risk_limits.read().to_runtime()
    }

    /// Set one risk limit at runtime with validation.
    ///
    /// A positive `max_loss` is read as a loss amount and stored negated.
    pub fn set_risk_limit(
        &self,
        kind: RuntimeRiskLimitKind,
        value: Decimal,
    ) -> Result<RuntimeRiskLimits, RuntimeRiskLimitUpdateError> {
        let mut limits = self.risk_limits.write();
        match kind {
            RuntimeRiskLimitKind::MaxTrades => limits.max_daily_trades = positive_integer(value)?,
            RuntimeRiskLimitKind::MaxLosses => {
                limits.max_consecutive_losses = positive_integer(value)?;
            }
            RuntimeRiskLimitKind::LotSize => limits.min_lot_size = positive_integer(value)?,
            RuntimeRiskLimitKind::MaxLoss => {
                if value == Decimal::ZERO {
                    return Err(RuntimeRiskLimitUpdateError::new("value must not be 0"));
                }
                limits.max_daily_loss = -value.abs();
            }
            RuntimeRiskLimitKind::MaxExposure => {
                if value <= Decimal::ZERO {
                    return Err(RuntimeRiskLimitUpdateError::new("value must be greater than 0"));
                }
                limits.max_exposure = value;
            }
        }
        Ok(limits.to_runtime())
    }

    pub fn counters(&self) -> RiskCounters {
        self.counters.lock().clone()
    }

    /// Run `f` with exclusive access to the counters.
    pub fn with_counters<R>(&self, f: impl FnOnce(&mut RiskCounters) -> R) -> R {
        f(&mut self.counters.lock())
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    pub fn halt(&self, reason: impl Into<String>) {
        self.halted.store(true, Ordering::SeqCst);
        *self.halt_reason.write() = Some(reason.into());
    }

    pub fn resume(&self) {
        self.halted.store(false, Ordering::SeqCst);
        *self.halt_reason.write() = None;
    }

    pub fn halt_reason(&self) -> Option<String> {
        self.halt_reason.read().clone()
    }

    pub fn open_position(&self) -> Option<Position> {
        self.open_position.read().clone()
    }

    pub fn set_open_position(&self, position: Option<Position>) {
        *self.open_position.write() = position;
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(TradingMode::default(), RiskLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_match_documented_limits() {
        let limits = RiskLimits::default();
        assert_eq!(limits.max_daily_trades, 3);
        assert_eq!(limits.max_consecutive_losses, 2);
        assert_eq!(limits.max_daily_loss, dec!(-25000));
        assert_eq!(limits.balance_buffer, dec!(1.1));
        assert_eq!(limits.sizing_fraction, dec!(0.9));
        assert!(!limits.allow_manual_reset);
    }

    #[test]
    fn halt_and_resume() {
        let state = AppState::default();
        assert!(!state.is_halted());

        state.halt("operator pause");
        assert!(state.is_halted());
        assert_eq!(state.halt_reason().as_deref(), Some("operator pause"));

        state.resume();
        assert!(!state.is_halted());
        assert!(state.halt_reason().is_none());
    }

    #[test]
    fn set_risk_limit_validates_integers() {
        let state = AppState::default();

        let updated = state
            .set_risk_limit(RuntimeRiskLimitKind::MaxTrades, dec!(5))
            .unwrap();
        assert_eq!(updated.max_daily_trades, 5);

        assert!(state
            .set_risk_limit(RuntimeRiskLimitKind::MaxTrades, dec!(0))
            .is_err());
        assert!(state
            .set_risk_limit(RuntimeRiskLimitKind::LotSize, dec!(2.5))
            .is_err());
        assert_eq!(state.risk_limits().max_daily_trades, 5);
    }

    #[test]
    fn max_loss_is_stored_negative() {
        let state = AppState::default();
        let updated = state
            .set_risk_limit(RuntimeRiskLimitKind::MaxLoss, dec!(30000))
            .unwrap();
        assert_eq!(updated.max_daily_loss, dec!(-30000));

        let updated = state
            .set_risk_limit(RuntimeRiskLimitKind::MaxLoss, dec!(-10000))
            .unwrap();
        assert_eq!(updated.max_daily_loss, dec!(-10000));

        assert!(state
            .set_risk_limit(RuntimeRiskLimitKind::MaxLoss, dec!(0))
            .is_err());
    }

    #[test]
    fn exposure_must_be_positive() {
        let state = AppState::default();
        assert!(state
            .set_risk_limit(RuntimeRiskLimitKind::MaxExposure, dec!(-1))
            .is_err());
        let updated = state
            .set_risk_limit(RuntimeRiskLimitKind::MaxExposure, dec!(150000))
            .unwrap();
        assert_eq!(updated.max_exposure, dec!(150000));
    }
}
