//! Trading engine: one decision per 3-minute bar.
//!
//! Each cycle either manages the open position or looks for a new entry.
//! There is never more than one position at a time.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::application::risk::{RiskManager, RiskRequest};
use crate::application::signal::{OptionLeg, SignalConfig, SignalOrchestrator};
use crate::domain::calendar::{ist_date, ist_instant};
use crate::domain::money::{price_from_f64, Price};
use crate::domain::{
    option_symbol, select_strike, weekly_expiry, CandleSeries, ExitReason, NewPosition,
    OptionType, Position, SignalSource, StrikeSlot, TradingSession, TradingSignal,
    OPTIONS_EXCHANGE, SENSEX_TOKEN,
};
use crate::error::{Result, RiskError};
use crate::port::inbound::risk::RiskCheckResult;
use crate::port::outbound::broker::{Broker, CandleInterval, OrderRequest, TransactionType};
use crate::port::outbound::notifier::{Event, NotifierRegistry, SignalEvent};
use crate::port::outbound::store::{AlertKind, AlertRecord, TradeStore};

/// Spacing between cycles.
pub const CYCLE_INTERVAL: StdDuration = StdDuration::from_secs(180);

const MARKET_OPEN_SECS: u32 = 9 * 3600 + 15 * 60;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Lots per entry; quantity is `lots * min_lot_size`.
    pub lots: u32,
    pub index_token: u64,
    pub interval: CandleInterval,
    pub expiry_weekday: Weekday,
    pub signal: SignalConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lots: 1,
            index_token: SENSEX_TOKEN,
            interval: CandleInterval::ThreeMinute,
            expiry_weekday: Weekday::Thu,
            signal: SignalConfig::default(),
        }
    }
}

/// What a cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Outside the trading window.
    Skipped,
    /// Session closed for the day.
    EndOfDay { closed: Option<Position> },
    /// No signal, or no data.
    Idle,
    Entered(Position),
    Held(Position),
    Exited { position: Position, pnl: Price },
    Rejected(RiskError),
}

pub struct TradingEngine {
    broker: Arc<dyn Broker>,
    risk: Arc<RiskManager>,
    store: Arc<dyn TradeStore>,
    notifier: Arc<NotifierRegistry>,
    orchestrator: SignalOrchestrator,
    settings: EngineSettings,
    session: Option<TradingSession>,
}

impl TradingEngine {
    pub fn new(
        broker: Arc<dyn Broker>,
        risk: Arc<RiskManager>,
        store: Arc<dyn TradeStore>,
        notifier: Arc<NotifierRegistry>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            orchestrator: SignalOrchestrator::new(settings.signal.clone()),
            broker,
            risk,
            store,
            notifier,
            settings,
            session: None,
        }
    }

    #[must_use]
    pub const fn session(&self) -> Option<&TradingSession> {
        self.session.as_ref()
    }

    /// Run one cycle at `at`.
    ///
    /// Failures are recorded on the session and as `ERROR` alerts before
    /// being returned. The session is persisted after every cycle that
    /// touched it.
    ///
    /// # Errors
    ///
    /// Broker and storage failures from this cycle.
    pub async fn run_cycle(&mut self, at: DateTime<Utc>) -> Result<CycleOutcome> {
        let calendar = self.risk.calendar().clone();
        if !calendar.is_trading_window(at) {
            if calendar.is_past_entry_window(at) {
                return self.end_of_day(at).await;
            }
            debug!("Outside trading window");
            return Ok(CycleOutcome::Skipped);
        }

        self.ensure_session(at);
        self.risk.check_daily_reset(at);

        let result = self.step(at).await;
        if let Err(e) = &result {
            self.record_error(&e.to_string(), at);
        }
        self.persist_session();
        result
    }

    async fn step(&mut self, at: DateTime<Utc>) -> Result<CycleOutcome> {
        let sensex = self.index_candles(at).await?;
        if let (Some(session), Some(last)) = (self.session.as_mut(), sensex.last()) {
            session.record_sensex_entry(price_from_f64(last.close));
        }

        match self.risk.state().open_position() {
            Some(position) => self.manage_position(position, at).await,
            None => self.look_for_entry(&sensex, at).await,
        }
    }

    async fn index_candles(&self, at: DateTime<Utc>) -> Result<CandleSeries> {
        let today = ist_date(at);
        let from = ist_instant(
            self.risk.calendar().previous_trading_day(today),
            MARKET_OPEN_SECS,
        );
        let candles = self
            .broker
            .historical(self.settings.index_token, from, at, self.settings.interval)
            .await?;
        debug!(count = candles.len(), "SENSEX candles");
        Ok(CandleSeries::new(candles))
    }

    async fn option_candles(&self, symbol: &str, at: DateTime<Utc>) -> Result<CandleSeries> {
        let instrument = self.broker.find_instrument(OPTIONS_EXCHANGE, symbol).await?;
        let from = ist_instant(
            self.risk.calendar().previous_trading_day(ist_date(at)),
            MARKET_OPEN_SECS,
        );
        let candles = self
            .broker
            .historical(instrument.instrument_token, from, at, self.settings.interval)
            .await?;
        Ok(CandleSeries::new(candles))
    }

    async fn manage_position(
        &mut self,
        mut position: Position,
        at: DateTime<Utc>,
    ) -> Result<CycleOutcome> {
        let series = self.option_candles(&position.symbol, at).await?;
        position.candle_count += 1;

        let check = self.orchestrator.detect_exit(&position, &series, at);
        let Some(reason) = check.reason else {
            self.risk.state().set_open_position(Some(position.clone()));
            if position.id.is_some() {
                self.store.update_position(&position)?;
            }
            return Ok(CycleOutcome::Held(position));
        };

        let mark = series.last().map(|c| price_from_f64(c.close));
        let (position, pnl) = self.close(position, reason, mark, at).await?;
        Ok(CycleOutcome::Exited { position, pnl })
    }

    async fn close(
        &mut self,
        mut position: Position,
        reason: ExitReason,
        mark: Option<Price>,
        at: DateTime<Utc>,
    ) -> Result<(Position, Price)> {
        let mark = match mark {
            Some(mark) => mark,
            None => {
                let key = format!("{OPTIONS_EXCHANGE}:{}", position.symbol);
                self.broker.ltp(&key).await?
            }
        };
        let order = OrderRequest::market(
            OPTIONS_EXCHANGE,
            &position.symbol,
            TransactionType::Sell,
            position.quantity,
            mark,
        );
        let ack = self.broker.place_order(&order).await?;
        let exit_price = ack.fill_price.unwrap_or(mark);

        let pnl = position.close(exit_price, reason, at);
        self.risk.record_position_closed(&position, pnl)?;
        if let Some(session) = self.session.as_mut() {
            session.record_close(pnl);
        }
        info!(
            symbol = %position.symbol,
            reason = %reason,
            exit = %exit_price,
            pnl = %pnl,
            order_id = %ack.order_id,
            "Position exited"
        );
        Ok((position, pnl))
    }

    async fn look_for_entry(
        &mut self,
        sensex: &CandleSeries,
        at: DateTime<Utc>,
    ) -> Result<CycleOutcome> {
        let Some(last) = sensex.last() else {
            warn!("No SENSEX candles");
            return Ok(CycleOutcome::Idle);
        };

        let strike = select_strike(last.close, StrikeSlot::at(at));
        let expiry = weekly_expiry(at, self.settings.expiry_weekday);
        let ce_symbol = option_symbol(expiry, strike, OptionType::CE);
        let pe_symbol = option_symbol(expiry, strike, OptionType::PE);

        let ce = self.leg_candles(&ce_symbol, at).await;
        let pe = self.leg_candles(&pe_symbol, at).await;

        let signals = self.orchestrator.detect_entry(
            sensex,
            ce.as_ref().map(|series| OptionLeg {
                symbol: &ce_symbol,
                series,
            }),
            pe.as_ref().map(|series| OptionLeg {
                symbol: &pe_symbol,
                series,
            }),
            strike,
            at,
        );
        for signal in &signals {
            if let Some(session) = self.session.as_mut() {
                session.record_signal();
            }
            self.notifier
                .notify_all(Event::SignalDetected(SignalEvent::from(signal)));
        }

        let Some(signal) = signals.into_iter().next() else {
            return Ok(CycleOutcome::Idle);
        };
        let option_type = signal.option_type.unwrap_or(OptionType::CE);
        let (symbol, series) = match option_type {
            OptionType::CE => (ce_symbol, ce),
            OptionType::PE => (pe_symbol, pe),
        };
        let Some(series) = series else {
            warn!(symbol = %symbol, "Signal without option candles");
            return Ok(CycleOutcome::Idle);
        };

        let Some((premium, stop)) = self.entry_levels(&signal, &series) else {
            warn!(symbol = %symbol, "Not enough option candles to price entry");
            return Ok(CycleOutcome::Idle);
        };

        let quantity = self.risk.state().risk_limits().min_lot_size * self.settings.lots;
        let request = RiskRequest {
            symbol: symbol.clone(),
            price: premium,
            quantity,
        };
        let quantity = match self.risk.can_open_position(&request, at).await {
            RiskCheckResult::Approved { quantity, reason } => {
                debug!(reason = %reason, "Risk approved");
                quantity
            }
            RiskCheckResult::Rejected(e) => return Ok(CycleOutcome::Rejected(e)),
        };

        let order = OrderRequest::market(
            OPTIONS_EXCHANGE,
            &symbol,
            TransactionType::Buy,
            quantity,
            premium,
        );
        let ack = self.broker.place_order(&order).await?;
        let fill = ack.fill_price.unwrap_or(premium);

        let mut position = Position::open(
            NewPosition {
                symbol,
                option_type,
                strike,
                entry_price: fill,
                entry_basis: price_from_f64(last.close),
                stop_loss: stop,
                quantity,
            },
            at,
        )?;
        position.order_id = Some(ack.order_id);
        self.risk.record_position_opened(&mut position)?;
        if let Some(session) = self.session.as_mut() {
            session.record_open();
        }
        Ok(CycleOutcome::Entered(position))
    }

    /// Candles for one leg; a lookup failure only drops that leg.
    async fn leg_candles(&self, symbol: &str, at: DateTime<Utc>) -> Option<CandleSeries> {
        match self.option_candles(symbol, at).await {
            Ok(series) => Some(series),
            Err(e) => {
                warn!(symbol, error = %e, "Option candles unavailable");
                None
            }
        }
    }

    /// Premium and stop for the chosen leg.
    ///
    /// Option signals carry their own levels; an index signal is priced
    /// from the call's latest close and fast EMA.
    fn entry_levels(&self, signal: &TradingSignal, series: &CandleSeries) -> Option<(Price, Price)> {
        if signal.source == SignalSource::Option {
            return Some((price_from_f64(signal.entry_price), price_from_f64(signal.stop_loss)));
        }
        let cfg = &self.settings.signal;
        let snapshot = series.with_emas(cfg.ema_fast, cfg.ema_slow)?;
        Some((
            price_from_f64(snapshot.candle.close),
            price_from_f64(snapshot.fast),
        ))
    }

    /// Close any open position, finish the session and publish the report.
    async fn end_of_day(&mut self, at: DateTime<Utc>) -> Result<CycleOutcome> {
        let today = ist_date(at);
        self.ensure_session(at);
        if self.session.as_ref().is_some_and(TradingSession::is_finished) {
            return Ok(CycleOutcome::Skipped);
        }

        let mut closed = None;
        if let Some(position) = self.risk.state().open_position() {
            let mark = match self.option_candles(&position.symbol, at).await {
                Ok(series) => series.last().map(|c| price_from_f64(c.close)),
                Err(e) => {
                    warn!(error = %e, "End of day candles unavailable");
                    None
                }
            };
            match self.close(position, ExitReason::EndOfDay, mark, at).await {
                Ok((position, _)) => closed = Some(position),
                Err(e) => {
                    error!(error = %e, "End of day exit failed");
                    self.record_error(&e.to_string(), at);
                    self.persist_session();
                    return Err(e);
                }
            }
        }

        if let Some(session) = self.session.as_mut() {
            session.finish(at);
        }
        self.persist_session();
        self.publish_report(today);
        info!(date = %today, "Session closed");
        Ok(CycleOutcome::EndOfDay { closed })
    }

    fn publish_report(&self, date: NaiveDate) {
        match self.risk.daily_report(date) {
            Ok(report) => self
                .notifier
                .notify_all(Event::DailyReport(report.to_event())),
            Err(e) => warn!(error = %e, "Daily report failed"),
        }
    }

    fn ensure_session(&mut self, at: DateTime<Utc>) {
        let today = ist_date(at);
        if self.session.as_ref().is_some_and(|s| s.date == today) {
            return;
        }
        let session = match self.store.session_for_date(today) {
            Ok(Some(existing)) => existing,
            Ok(None) => TradingSession::new(today, at),
            Err(e) => {
                warn!(error = %e, "Failed to load session");
                TradingSession::new(today, at)
            }
        };
        info!(date = %today, "Trading session started");
        self.session = Some(session);
    }

    fn persist_session(&self) {
        if let Some(session) = &self.session {
            if let Err(e) = self.store.save_session(session) {
                warn!(error = %e, "Failed to persist session");
            }
        }
    }

    fn record_error(&mut self, message: &str, at: DateTime<Utc>) {
        error!(error = %message, "Cycle failed");
        if let Some(session) = self.session.as_mut() {
            session.record_error(message);
        }
        let alert = AlertRecord::new(AlertKind::Error, message, json!({ "context": "cycle" }), at);
        if let Err(e) = self.store.save_alert(&alert) {
            warn!(error = %e, "Failed to persist error alert");
        }
        self.notifier.notify_all(Event::SystemError {
            context: "trading cycle".to_string(),
            message: message.to_string(),
        });
    }
}
