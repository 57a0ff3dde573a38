//! Risk management service.
//!
//! Gates every new entry against the daily limits, keeps the counters in
//! step with fills and exits, and persists violations and overrides as
//! alerts.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{error, info, warn};

use super::balance::BalanceSource;
use super::report::DailyReport;
use super::validate::{validate, CredentialPresence};
use crate::application::state::{AppState, RiskCounters};
use crate::domain::calendar::ist_date;
use crate::domain::money::{Price, Quantity};
use crate::domain::{ExitReason, MarketCalendar, Position, PositionStatus};
use crate::error::{Result, RiskError};
use crate::port::inbound::risk::RiskCheckResult;
use crate::port::inbound::runtime::{HealthCheck, HealthReport, RiskStatus};
use crate::port::outbound::notifier::{
    ClosedEvent, Event, NotifierRegistry, OpenedEvent, RiskEvent,
};
use crate::port::outbound::store::{AlertKind, AlertRecord, TradeStore};

/// A proposed entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskRequest {
    pub symbol: String,
    pub price: Price,
    pub quantity: Quantity,
}

impl RiskRequest {
    #[must_use]
    pub fn value(&self) -> Price {
        self.price * Decimal::from(self.quantity)
    }
}

/// Risk manager that validates entries and tracks the daily counters.
///
/// Rules, in order:
/// - halt flag
/// - daily reset when due
/// - max trades per day
/// - consecutive losses
/// - daily loss limit
/// - single position size
/// - market hours
/// - balance, with dynamic sizing in live mode
pub struct RiskManager {
    state: Arc<AppState>,
    store: Arc<dyn TradeStore>,
    notifier: Arc<NotifierRegistry>,
    calendar: MarketCalendar,
    balance: Arc<BalanceSource>,
}

impl RiskManager {
    pub fn new(
        state: Arc<AppState>,
        store: Arc<dyn TradeStore>,
        notifier: Arc<NotifierRegistry>,
        calendar: MarketCalendar,
        balance: Arc<BalanceSource>,
    ) -> Self {
        Self {
            state,
            store,
            notifier,
            calendar,
            balance,
        }
    }

    #[must_use]
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    #[must_use]
    pub fn calendar(&self) -> &MarketCalendar {
        &self.calendar
    }

    #[must_use]
    pub fn balance(&self) -> &Arc<BalanceSource> {
        &self.balance
    }

    /// Validate a proposed entry against every rule.
    ///
    /// Returns [`RiskCheckResult::Approved`] with the quantity to trade, or
    /// [`RiskCheckResult::Rejected`] with the first rule that failed.
    pub async fn can_open_position(
        &self,
        request: &RiskRequest,
        at: DateTime<Utc>,
    ) -> RiskCheckResult {
        if self.state.is_halted() {
            let reason = self
                .state
                .halt_reason()
                .unwrap_or_else(|| "unknown".to_string());
            warn!(reason = %reason, "Trading halted");
            return RiskCheckResult::Rejected(RiskError::TradingHalted { reason });
        }

        self.check_daily_reset(at);

        if let Err(e) = self.check_counters(request) {
            return self.reject(request, e, at);
        }

        if !self.calendar.is_market_open(at) {
            return self.reject(request, RiskError::MarketClosed, at);
        }

        match self.check_balance(request).await {
            Ok(result) => result,
            Err(e) => self.reject(request, e, at),
        }
    }

    fn check_counters(&self, request: &RiskRequest) -> std::result::Result<(), RiskError> {
        let limits = self.state.risk_limits();
        let counters = self.state.counters();

        if counters.trades_today >= limits.max_daily_trades {
            return Err(RiskError::MaxDailyTrades {
                count: counters.trades_today,
                limit: limits.max_daily_trades,
            });
        }
        if counters.consecutive_losses >= limits.max_consecutive_losses {
            return Err(RiskError::ConsecutiveLosses {
                count: counters.consecutive_losses,
                limit: limits.max_consecutive_losses,
            });
        }
        if counters.daily_pnl < limits.max_daily_loss {
            return Err(RiskError::DailyLossLimit {
                pnl: counters.daily_pnl,
                limit: limits.max_daily_loss,
            });
        }
        let value = request.value();
        if value > limits.max_exposure {
            return Err(RiskError::PositionTooLarge {
                value,
                limit: limits.max_exposure,
            });
        }
        Ok(())
    }

    async fn check_balance(
        &self,
        request: &RiskRequest,
    ) -> std::result::Result<RiskCheckResult, RiskError> {
        let limits = self.state.risk_limits();
        let required = request.value() * limits.balance_buffer;
        let available = self.balance.available().await.amount;

        if available >= required {
            return Ok(RiskCheckResult::Approved {
                quantity: request.quantity,
                reason: format!("balance ok: {available} >= {required}"),
            });
        }

        if !self.state.mode().is_live() || request.price <= Decimal::ZERO {
            return Err(RiskError::InsufficientBalance {
                available,
                required,
            });
        }

        let max_qty = (available * limits.sizing_fraction / request.price)
            .floor()
            .to_u32()
            .unwrap_or(0);
        if max_qty < limits.min_lot_size {
            return Err(RiskError::InsufficientBalance {
                available,
                required,
            });
        }

        let quantity = max_qty - (max_qty % limits.min_lot_size);
        warn!(
            symbol = %request.symbol,
            requested = request.quantity,
            approved = quantity,
            available = %available,
            "Position size reduced to fit balance"
        );
        Ok(RiskCheckResult::Approved {
            quantity,
            reason: format!(
                "balance adjustment: {} -> {quantity} qty fits {available}",
                request.quantity
            ),
        })
    }

    fn reject(&self, request: &RiskRequest, err: RiskError, at: DateTime<Utc>) -> RiskCheckResult {
        warn!(symbol = %request.symbol, code = err.code(), reason = %err, "Risk rejected");
        let counters = self.state.counters();
        self.save_alert(AlertRecord::new(
            AlertKind::RiskViolation,
            err.to_string(),
            json!({
                "code": err.code(),
                "symbol": request.symbol,
                "quantity": request.quantity,
                "price": request.price,
                "trades_today": counters.trades_today,
                "consecutive_losses": counters.consecutive_losses,
                "daily_pnl": counters.daily_pnl,
            }),
            at,
        ));
        self.notifier
            .notify_all(Event::RiskRejected(RiskEvent::new(&request.symbol, &err)));
        RiskCheckResult::Rejected(err)
    }

    /// Zero the daily counters on the first check of a new trading day.
    ///
    /// Also lifts any halt left over from the previous day. Returns `true`
    /// when a reset happened.
    pub fn check_daily_reset(&self, at: DateTime<Utc>) -> bool {
        let today = ist_date(at);
        let calendar = &self.calendar;
        let reset = self.state.with_counters(|c| {
            if !calendar.should_daily_reset(c.last_reset_date, at) {
                return false;
            }
            *c = RiskCounters {
                last_reset_date: Some(today),
                ..RiskCounters::default()
            };
            true
        });
        if !reset {
            return false;
        }

        let was_halted = self.state.is_halted();
        self.state.resume();
        if let Err(e) = self.store.set_last_risk_reset(today) {
            warn!(error = %e, "Failed to persist risk reset date");
        }
        info!(date = %today, "Daily risk counters reset");
        if was_halted {
            self.notifier.notify_all(Event::TradingResumed);
        }
        true
    }

    /// Count a filled entry and persist it.
    ///
    /// The counters move before the write: the order is already at the
    /// broker, so a storage failure must not free up a trade slot.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn record_position_opened(&self, position: &mut Position) -> Result<()> {
        let limits = self.state.risk_limits();
        let value = position.position_value();
        let (trade_number, remaining) = self.state.with_counters(|c| {
            c.trades_today += 1;
            c.exposure += value;
            (
                c.trades_today,
                limits.max_daily_trades.saturating_sub(c.trades_today),
            )
        });
        self.state.set_open_position(Some(position.clone()));

        let id = self
            .store
            .save_position(position, ist_date(position.entry_time))?;
        position.id = Some(id);
        self.state.set_open_position(Some(position.clone()));

        info!(
            symbol = %position.symbol,
            qty = position.quantity,
            entry = %position.entry_price,
            trade = trade_number,
            remaining,
            "Position opened"
        );
        self.notifier.notify_all(Event::PositionOpened(OpenedEvent::new(
            position,
            self.state.mode(),
            trade_number,
            remaining,
        )));
        Ok(())
    }

    /// Apply an exit to the counters and persist the closed position.
    ///
    /// A loss extends the streak and halts trading at the limit; any other
    /// result resets the streak.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn record_position_closed(&self, position: &Position, pnl: Price) -> Result<()> {
        let limits = self.state.risk_limits();
        let value = position.position_value();
        let (daily_pnl, losses) = self.state.with_counters(|c| {
            c.daily_pnl += pnl;
            if pnl < Decimal::ZERO {
                c.consecutive_losses += 1;
            } else {
                c.consecutive_losses = 0;
            }
            c.exposure = (c.exposure - value).max(Decimal::ZERO);
            (c.daily_pnl, c.consecutive_losses)
        });
        self.state.set_open_position(None);

        if pnl < Decimal::ZERO && losses >= limits.max_consecutive_losses {
            let reason = format!("{losses} consecutive losses");
            error!(reason = %reason, "Trading halted");
            self.state.halt(reason.clone());
            self.save_alert(AlertRecord::new(
                AlertKind::TradingHalted,
                reason.clone(),
                json!({ "daily_pnl": daily_pnl, "consecutive_losses": losses }),
                position.exit_time.unwrap_or_else(Utc::now),
            ));
            self.notifier.notify_all(Event::TradingHalted { reason });
        }

        if position.id.is_some() {
            self.store.update_position(position)?;
        } else {
            let date = ist_date(position.entry_time);
            self.store.save_position(position, date)?;
        }

        info!(
            symbol = %position.symbol,
            pnl = %pnl,
            daily_pnl = %daily_pnl,
            consecutive_losses = losses,
            "Position closed"
        );
        self.notifier.notify_all(Event::PositionClosed(ClosedEvent {
            symbol: position.symbol.clone(),
            quantity: position.quantity,
            entry_price: position.entry_price,
            exit_price: position.exit_price.unwrap_or(position.entry_price),
            pnl,
            reason: position
                .exit_reason
                .unwrap_or(ExitReason::Manual),
            daily_pnl,
            consecutive_losses: losses,
        }));
        Ok(())
    }

    #[must_use]
    pub fn risk_status(&self, at: DateTime<Utc>) -> RiskStatus {
        let limits = self.state.risk_limits();
        let c = self.state.counters();
        let halted = self.state.is_halted();
        RiskStatus {
            mode: self.state.mode(),
            trading_allowed: !halted
                && c.trades_today < limits.max_daily_trades
                && c.consecutive_losses < limits.max_consecutive_losses
                && c.daily_pnl >= limits.max_daily_loss,
            halted,
            halt_reason: self.state.halt_reason(),
            trades_today: c.trades_today,
            max_daily_trades: limits.max_daily_trades,
            remaining_trades: limits.max_daily_trades.saturating_sub(c.trades_today),
            consecutive_losses: c.consecutive_losses,
            max_consecutive_losses: limits.max_consecutive_losses,
            daily_pnl: c.daily_pnl,
            max_daily_loss: limits.max_daily_loss,
            exposure: c.exposure,
            max_exposure: limits.max_exposure,
            market_open: self.calendar.is_market_open(at),
            last_reset: c.last_reset_date,
        }
    }

    /// Operator halt without an alert record.
    pub fn pause(&self, reason: &str) {
        warn!(reason = %reason, "Trading paused");
        self.state.halt(reason);
        self.notifier.notify_all(Event::TradingHalted {
            reason: reason.to_string(),
        });
    }

    /// Lift a halt; the counters are left as they are.
    pub fn resume(&self) {
        if !self.state.is_halted() {
            return;
        }
        info!("Trading resumed");
        self.state.resume();
        self.notifier.notify_all(Event::TradingResumed);
    }

    /// Halt trading and return the status from just before the stop.
    pub fn emergency_stop(&self, reason: &str, at: DateTime<Utc>) -> RiskStatus {
        let previous = self.risk_status(at);
        let reason = format!("EMERGENCY STOP: {reason}");
        error!(reason = %reason, "Emergency stop");
        self.state.halt(reason.clone());
        self.save_alert(AlertRecord::new(
            AlertKind::EmergencyStop,
            reason.clone(),
            serde_json::to_value(&previous).unwrap_or_default(),
            at,
        ));
        self.notifier.notify_all(Event::TradingHalted { reason });
        previous
    }

    /// Zero the counters and lift the halt.
    ///
    /// # Errors
    ///
    /// [`RiskError::ManualResetDisabled`] unless enabled in config.
    pub fn manual_reset(&self, at: DateTime<Utc>) -> std::result::Result<RiskStatus, RiskError> {
        if !self.state.risk_limits().allow_manual_reset {
            return Err(RiskError::ManualResetDisabled);
        }
        let today = ist_date(at);
        self.state.with_counters(|c| {
            *c = RiskCounters {
                last_reset_date: Some(today),
                ..RiskCounters::default()
            };
        });
        self.state.resume();
        warn!("Manual risk reset");

        if let Err(e) = self.store.set_last_risk_reset(today) {
            warn!(error = %e, "Failed to persist risk reset date");
        }
        self.save_alert(AlertRecord::new(
            AlertKind::ManualRiskReset,
            "Manual override",
            json!({ "user": "MANUAL" }),
            at,
        ));
        self.notifier.notify_all(Event::TradingResumed);
        Ok(self.risk_status(at))
    }

    /// Report for `date` from persisted positions and violations.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn daily_report(&self, date: NaiveDate) -> Result<DailyReport> {
        let positions = self.store.positions_for_date(date)?;
        let violations = self
            .store
            .alerts_for_date(date, Some(AlertKind::RiskViolation.as_str()))?;
        Ok(DailyReport::build(
            date,
            &positions,
            &violations,
            &self.state.risk_limits(),
            self.state.counters().consecutive_losses,
        ))
    }

    /// Rebuild the counters from storage after a restart.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn restore(&self, at: DateTime<Utc>) -> Result<()> {
        let today = ist_date(at);
        let last_reset = self.store.last_risk_reset()?;
        let todays = self.store.positions_for_date(today)?;
        let open = self.store.open_positions()?;
        let limit = self.state.risk_limits().max_consecutive_losses;

        let closed: Vec<&Position> = todays
            .iter()
            .filter(|p| p.status == PositionStatus::Closed)
            .collect();
        let daily_pnl: Decimal = closed.iter().filter_map(|p| p.pnl).sum();
        let streak = closed
            .iter()
            .rev()
            .take_while(|p| p.is_loss())
            .count();
        let streak = u32::try_from(streak).unwrap_or(u32::MAX).min(limit);
        let exposure: Decimal = open.iter().map(Position::position_value).sum();
        let trades = u32::try_from(todays.len()).unwrap_or(u32::MAX);

        self.state.with_counters(|c| {
            *c = RiskCounters {
                trades_today: trades,
                consecutive_losses: streak,
                daily_pnl,
                exposure,
                last_reset_date: last_reset,
            };
        });
        self.state.set_open_position(open.last().cloned());

        info!(
            trades,
            pnl = %daily_pnl,
            losses = streak,
            open = open.len(),
            "Risk state restored"
        );
        Ok(())
    }

    /// Config validation, database reachability and trading permission.
    #[must_use]
    pub fn health_check(&self, credentials: CredentialPresence, at: DateTime<Utc>) -> HealthReport {
        let issues = validate(&self.state.risk_limits(), self.state.mode(), credentials);
        let config = HealthCheck {
            name: "config",
            ok: issues.is_empty(),
            detail: if issues.is_empty() {
                format!("valid ({} mode)", self.state.mode())
            } else {
                issues
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ")
            },
        };

        let database = match self.store.ping() {
            Ok(()) => HealthCheck {
                name: "database",
                ok: true,
                detail: "connected".to_string(),
            },
            Err(e) => HealthCheck {
                name: "database",
                ok: false,
                detail: e.to_string(),
            },
        };

        let status = self.risk_status(at);
        let trading = HealthCheck {
            name: "trading",
            ok: status.trading_allowed,
            detail: if status.trading_allowed {
                format!("{} trades remaining", status.remaining_trades)
            } else {
                status
                    .halt_reason
                    .clone()
                    .unwrap_or_else(|| "daily limits reached".to_string())
            },
        };

        HealthReport::from_checks(vec![config, database, trading], at)
    }

    fn save_alert(&self, alert: AlertRecord) {
        if let Err(e) = self.store.save_alert(&alert) {
            warn!(error = %e, alert_type = %alert.alert_type, "Failed to persist alert");
        }
    }
}
