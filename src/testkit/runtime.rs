//! In-memory [`RuntimeState`] for control-surface tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::RwLock;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{Position, TradingMode};
use crate::error::RiskError;
use crate::port::inbound::runtime::{
    BalanceOrigin, BalanceView, HealthCheck, HealthReport, LoginLink, LoginUnavailable,
    RiskStatus, RuntimeRiskLimitKind, RuntimeRiskLimitUpdateError, RuntimeRiskLimits,
    RuntimeState, TokenView,
};

/// Runtime stub with settable halt, login window and token state.
pub struct StubRuntime {
    mode: TradingMode,
    limits: RwLock<RuntimeRiskLimits>,
    halt_reason: RwLock<Option<String>>,
    trades_today: RwLock<u32>,
    login_open: AtomicBool,
    manual_reset: AtomicBool,
    token: RwLock<TokenView>,
    position: RwLock<Option<Position>>,
}

impl StubRuntime {
    #[must_use]
    pub fn new(mode: TradingMode) -> Self {
        Self {
            mode,
            limits: RwLock::new(RuntimeRiskLimits {
                max_daily_trades: 3,
                max_consecutive_losses: 2,
                max_daily_loss: dec!(-5000),
                max_exposure: dec!(100000),
                lot_size: 20,
            }),
            halt_reason: RwLock::new(None),
            trades_today: RwLock::new(0),
            login_open: AtomicBool::new(true),
            manual_reset: AtomicBool::new(true),
            token: RwLock::new(TokenView {
                present: false,
                preview: None,
                issued_at: None,
                expires_at: None,
                valid: false,
            }),
            position: RwLock::new(None),
        }
    }

    pub fn set_login_open(&self, open: bool) {
        self.login_open.store(open, Ordering::SeqCst);
    }

    pub fn set_manual_reset(&self, allowed: bool) {
        self.manual_reset.store(allowed, Ordering::SeqCst);
    }

    pub fn set_trades_today(&self, count: u32) {
        *self.trades_today.write() = count;
    }

    pub fn set_token(&self, token: TokenView) {
        *self.token.write() = token;
    }

    pub fn set_position(&self, position: Option<Position>) {
        *self.position.write() = position;
    }

    #[must_use]
    pub fn halt_reason(&self) -> Option<String> {
        self.halt_reason.read().clone()
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 5, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

#[async_trait]
impl RuntimeState for StubRuntime {
    fn mode(&self) -> TradingMode {
        self.mode
    }

    fn risk_status(&self) -> RiskStatus {
        let limits = self.limits.read().clone();
        let halt_reason = self.halt_reason.read().clone();
        let trades_today = *self.trades_today.read();
        RiskStatus {
            mode: self.mode,
            trading_allowed: halt_reason.is_none() && trades_today < limits.max_daily_trades,
            halted: halt_reason.is_some(),
            halt_reason,
            trades_today,
            max_daily_trades: limits.max_daily_trades,
            remaining_trades: limits.max_daily_trades.saturating_sub(trades_today),
            consecutive_losses: 0,
            max_consecutive_losses: limits.max_consecutive_losses,
            daily_pnl: Decimal::ZERO,
            max_daily_loss: limits.max_daily_loss,
            exposure: Decimal::ZERO,
            max_exposure: limits.max_exposure,
            market_open: true,
            last_reset: None,
        }
    }

    fn risk_limits(&self) -> RuntimeRiskLimits {
        self.limits.read().clone()
    }

    fn set_risk_limit(
        &self,
        kind: RuntimeRiskLimitKind,
        value: Decimal,
    ) -> Result<RuntimeRiskLimits, RuntimeRiskLimitUpdateError> {
        if value.is_zero() {
            return Err(RuntimeRiskLimitUpdateError::new("must not be zero"));
        }
        let whole = || {
            value
                .to_u32()
                .ok_or(RuntimeRiskLimitUpdateError::new("must be a positive integer"))
        };
        let mut limits = self.limits.write();
        match kind {
            RuntimeRiskLimitKind::MaxTrades => limits.max_daily_trades = whole()?,
            RuntimeRiskLimitKind::MaxLosses => limits.max_consecutive_losses = whole()?,
            RuntimeRiskLimitKind::MaxLoss => limits.max_daily_loss = -value.abs(),
            RuntimeRiskLimitKind::MaxExposure => limits.max_exposure = value,
            RuntimeRiskLimitKind::LotSize => limits.lot_size = whole()?,
        }
        Ok(limits.clone())
    }

    fn pause(&self, reason: &str) {
        *self.halt_reason.write() = Some(reason.to_string());
    }

    fn resume(&self) {
        *self.halt_reason.write() = None;
    }

    fn emergency_stop(&self, reason: &str) -> RiskStatus {
        let before = self.risk_status();
        self.pause(reason);
        before
    }

    fn reset_risk(&self) -> Result<RiskStatus, RiskError> {
        if !self.manual_reset.load(Ordering::SeqCst) {
            return Err(RiskError::ManualResetDisabled);
        }
        *self.trades_today.write() = 0;
        *self.halt_reason.write() = None;
        Ok(self.risk_status())
    }

    fn health(&self) -> HealthReport {
        let halted = self.halt_reason.read().is_some();
        let token = self.token.read().valid;
        HealthReport::from_checks(
            vec![
                HealthCheck {
                    name: "database",
                    ok: true,
                    detail: "ok".to_string(),
                },
                HealthCheck {
                    name: "access_token",
                    ok: token,
                    detail: if token { "valid" } else { "missing" }.to_string(),
                },
                HealthCheck {
                    name: "trading",
                    ok: !halted,
                    detail: if halted { "halted" } else { "active" }.to_string(),
                },
            ],
            Self::fixed_now(),
        )
    }

    async fn balance(&self) -> BalanceView {
        BalanceView {
            amount: dec!(100000),
            origin: BalanceOrigin::Virtual,
        }
    }

    fn token(&self) -> TokenView {
        self.token.read().clone()
    }

    fn start_login(&self) -> Result<LoginLink, LoginUnavailable> {
        if !self.login_open.load(Ordering::SeqCst) {
            return Err(LoginUnavailable(
                "Login is only available 09:00-15:30 IST on trading days".to_string(),
            ));
        }
        let now = Self::fixed_now();
        Ok(LoginLink {
            state: "stub-state".to_string(),
            login_url: "https://kite.zerodha.com/connect/login?api_key=key&v=3".to_string(),
            postback_url: "http://127.0.0.1:8001/postback".to_string(),
            expires_at: now + Duration::seconds(300),
        })
    }

    fn open_position(&self) -> Option<Position> {
        self.position.read().clone()
    }
}
