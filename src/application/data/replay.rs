//! Replay of an archived day through the trading engine.
//!
//! [`ReplayBroker`] serves archived candles as a [`Broker`] that never shows
//! a bar before it has closed. [`replay_day`] walks the session bar by bar
//! with a fresh risk state and summarizes what the engine would have done.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::collector::{MARKET_CLOSE_SECS, MARKET_OPEN_SECS};
use crate::application::risk::{BalanceSource, RiskManager};
use crate::application::state::{AppState, RiskLimits};
use crate::application::trading::{CycleOutcome, EngineSettings, TradingEngine};
use crate::domain::calendar::ist_instant;
use crate::domain::money::{price_from_f64, Price};
use crate::domain::{
    Candle, MarketCalendar, Position, TradingMode, INDEX_SYMBOL, SENSEX_TOKEN,
};
use crate::error::{BrokerError, Error, Result};
use crate::port::outbound::archive::{CandleArchive, DayData};
use crate::port::outbound::broker::{
    Broker, CandleInterval, Instrument, OrderAck, OrderRequest,
};
use crate::port::outbound::notifier::NotifierRegistry;
use crate::port::outbound::store::TradeStore;

const REPLAY_TOKEN_BASE: u64 = 2_000_000;
const BLOCK_REASONS_KEPT: usize = 3;

/// [`Broker`] over archived candles.
///
/// Only bars that have closed by the cursor set with
/// [`ReplayBroker::advance_to`] are visible. Orders fill at their reference
/// price.
pub struct ReplayBroker {
    series: HashMap<u64, Vec<Candle>>,
    tokens: HashMap<String, u64>,
    virtual_balance: Price,
    cursor: Mutex<Option<DateTime<Utc>>>,
    next_order: AtomicU64,
}

impl ReplayBroker {
    /// Merge the series of `days`, oldest day first.
    pub fn new(days: &[DayData], virtual_balance: Price) -> Self {
        let mut tokens = HashMap::from([(INDEX_SYMBOL.to_string(), SENSEX_TOKEN)]);
        let mut series: HashMap<u64, Vec<Candle>> = HashMap::new();
        for day in days {
            for (symbol, candles) in &day.series {
                let next = REPLAY_TOKEN_BASE + tokens.len() as u64;
                let token = *tokens.entry(symbol.clone()).or_insert(next);
                series.entry(token).or_default().extend_from_slice(candles);
            }
        }
        for candles in series.values_mut() {
            candles.sort_by_key(|c| c.timestamp);
            candles.dedup_by_key(|c| c.timestamp);
        }
        Self {
            series,
            tokens,
            virtual_balance,
            cursor: Mutex::new(None),
            next_order: AtomicU64::new(1),
        }
    }

    /// Move the replay clock to `at`.
    pub fn advance_to(&self, at: DateTime<Utc>) {
        *self.cursor.lock() = Some(at);
    }

    #[must_use]
    pub fn symbols(&self) -> usize {
        self.tokens.len()
    }

    fn visible(&self, token: u64, interval: CandleInterval) -> Vec<Candle> {
        let cursor = *self.cursor.lock();
        let width = Duration::seconds(interval.seconds());
        self.series
            .get(&token)
            .map(|candles| {
                candles
                    .iter()
                    .filter(|c| cursor.map_or(true, |now| c.timestamp + width <= now))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Broker for ReplayBroker {
    async fn available_balance(&self) -> Result<Price> {
        Ok(self.virtual_balance)
    }

    async fn ltp(&self, instrument: &str) -> Result<Price> {
        let symbol = instrument.split_once(':').map_or(instrument, |(_, s)| s);
        let not_found = || Error::Broker(BrokerError::InstrumentNotFound(instrument.to_string()));
        let token = *self.tokens.get(symbol).ok_or_else(not_found)?;
        self.visible(token, CandleInterval::ThreeMinute)
            .last()
            .map(|c| price_from_f64(c.close))
            .ok_or_else(not_found)
    }

    async fn historical(
        &self,
        token: u64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        interval: CandleInterval,
    ) -> Result<Vec<Candle>> {
        Ok(self
            .visible(token, interval)
            .into_iter()
            .filter(|c| c.timestamp >= from && c.timestamp <= to)
            .collect())
    }

    async fn find_instrument(&self, exchange: &str, tradingsymbol: &str) -> Result<Instrument> {
        let token = *self
            .tokens
            .get(tradingsymbol)
            .ok_or_else(|| Error::Broker(BrokerError::InstrumentNotFound(tradingsymbol.into())))?;
        let instrument_type = match tradingsymbol {
            INDEX_SYMBOL => "EQ",
            s if s.ends_with("PE") => "PE",
            _ => "CE",
        };
        Ok(Instrument {
            instrument_token: token,
            exchange: exchange.to_string(),
            tradingsymbol: tradingsymbol.to_string(),
            name: INDEX_SYMBOL.to_string(),
            strike: 0.0,
            expiry: None,
            lot_size: 20,
            instrument_type: instrument_type.to_string(),
        })
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        let fill = match order.price {
            Some(price) => price,
            None => self.ltp(&order.tradingsymbol).await?,
        };
        let order_id = format!("REPLAY-{}", self.next_order.fetch_add(1, Ordering::SeqCst));
        debug!(order_id = %order_id, symbol = %order.tradingsymbol, price = %fill, "Replay fill");
        Ok(OrderAck {
            order_id,
            fill_price: Some(fill),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReplaySettings {
    pub limits: RiskLimits,
    pub engine: EngineSettings,
    pub calendar: MarketCalendar,
}

/// Outcome of replaying one day.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub date: NaiveDate,
    pub atm_strike: Option<u32>,
    pub sensex_open: Option<f64>,
    pub sensex_close: Option<f64>,
    pub cycles: u32,
    pub signals: u32,
    pub trades: Vec<Position>,
    pub total_pnl: Decimal,
    /// Percent of closed trades with positive P&L.
    pub win_rate: Decimal,
    /// Largest peak-to-trough fall of cumulative P&L, in rupees.
    pub max_drawdown: Decimal,
    pub avg_hold_minutes: Option<f64>,
    /// Entries refused by the risk manager.
    pub blocked: u32,
    pub block_reasons: Vec<String>,
    pub errors: u32,
}

impl ReplayReport {
    fn summarize(date: NaiveDate, day: &DayData, trades: Vec<Position>) -> Self {
        let closed: Vec<&Position> = trades.iter().filter(|p| p.pnl.is_some()).collect();
        let pnls: Vec<Decimal> = closed.iter().filter_map(|p| p.pnl).collect();
        let total_pnl: Decimal = pnls.iter().copied().sum();
        let wins = pnls.iter().filter(|p| **p > Decimal::ZERO).count();
        let win_rate = if pnls.is_empty() {
            Decimal::ZERO
        } else {
            (Decimal::from(wins as u64) * Decimal::ONE_HUNDRED / Decimal::from(pnls.len() as u64))
                .round_dp(2)
        };

        let mut peak = Decimal::ZERO;
        let mut running = Decimal::ZERO;
        let mut max_drawdown = Decimal::ZERO;
        for pnl in &pnls {
            running += *pnl;
            peak = peak.max(running);
            max_drawdown = max_drawdown.max(peak - running);
        }

        let holds: Vec<f64> = closed
            .iter()
            .filter_map(|p| p.exit_time.map(|exit| (exit - p.entry_time).num_seconds() as f64 / 60.0))
            .collect();
        let avg_hold_minutes = if holds.is_empty() {
            None
        } else {
            Some(holds.iter().sum::<f64>() / holds.len() as f64)
        };

        let metadata = day.metadata.as_ref();
        let sensex = day.candles(INDEX_SYMBOL);
        Self {
            date,
            atm_strike: metadata.map(|m| m.atm_strike),
            sensex_open: metadata
                .and_then(|m| m.sensex_open)
                .or_else(|| sensex.and_then(|c| c.first()).map(|c| c.open)),
            sensex_close: metadata
                .and_then(|m| m.sensex_close)
                .or_else(|| sensex.and_then(|c| c.last()).map(|c| c.close)),
            cycles: 0,
            signals: 0,
            trades,
            total_pnl,
            win_rate,
            max_drawdown,
            avg_hold_minutes,
            blocked: 0,
            block_reasons: Vec::new(),
            errors: 0,
        }
    }
}

/// Replay `date` from `archive` with a fresh test-mode risk state.
///
/// The previous trading day is loaded too so indicators have the same
/// warm-up as a live session. Positions and sessions go to `store`.
///
/// # Errors
///
/// Nothing archived for `date`, archive read failures, or storage failures
/// while summarizing.
pub async fn replay_day(
    archive: &dyn CandleArchive,
    date: NaiveDate,
    store: Arc<dyn TradeStore>,
    settings: ReplaySettings,
) -> Result<ReplayReport> {
    let day = archive
        .load_day(date)?
        .ok_or_else(|| Error::Archive(format!("no archived data for {date}")))?;
    let previous = archive.load_day(settings.calendar.previous_trading_day(date))?;
    let days: Vec<DayData> = previous.into_iter().chain([day.clone()]).collect();

    let limits = settings.limits;
    let broker = Arc::new(ReplayBroker::new(&days, limits.virtual_balance));
    info!(date = %date, symbols = broker.symbols(), "Replaying archived day");

    let notifier = Arc::new(NotifierRegistry::new());
    let balance = Arc::new(BalanceSource::new(
        TradingMode::Test,
        None,
        limits.virtual_balance,
        limits.emergency_balance,
    ));
    let state = Arc::new(AppState::new(TradingMode::Test, limits));
    let risk = Arc::new(RiskManager::new(
        state,
        Arc::clone(&store),
        Arc::clone(&notifier),
        settings.calendar,
        balance,
    ));
    let interval = settings.engine.interval;
    let mut engine = TradingEngine::new(
        broker.clone(),
        risk,
        Arc::clone(&store),
        notifier,
        settings.engine,
    );

    let step = Duration::seconds(interval.seconds());
    let close = ist_instant(date, MARKET_CLOSE_SECS);
    let mut at = ist_instant(date, MARKET_OPEN_SECS);
    let (mut cycles, mut blocked, mut errors) = (0, 0, 0);
    let mut block_reasons = Vec::new();
    while at <= close {
        broker.advance_to(at);
        cycles += 1;
        match engine.run_cycle(at).await {
            Ok(CycleOutcome::Rejected(e)) => {
                blocked += 1;
                if block_reasons.len() < BLOCK_REASONS_KEPT {
                    block_reasons.push(e.to_string());
                }
            }
            Ok(outcome) => debug!(at = %at, ?outcome, "Replay cycle"),
            Err(e) => {
                warn!(at = %at, error = %e, "Replay cycle failed");
                errors += 1;
            }
        }
        at += step;
    }

    let trades = store.positions_for_date(date)?;
    let mut report = ReplayReport::summarize(date, &day, trades);
    report.cycles = cycles;
    report.signals = engine.session().map_or(0, |s| s.total_signals);
    report.blocked = blocked;
    report.block_reasons = block_reasons;
    report.errors = errors;
    info!(
        date = %date,
        trades = report.trades.len(),
        pnl = %report.total_pnl,
        blocked,
        "Replay complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::outbound::archive::CsvCandleArchive;
    use crate::adapter::outbound::kite::PaperBroker;
    use crate::application::data::{CollectorSettings, DataCollector};
    use crate::domain::{ExitReason, OptionType};
    use crate::testkit::domain::{candles_from_closes, ist, open_position, trading_day};
    use crate::testkit::store::MemoryStore;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    const CE: &str = "SENSEX2510975000CE";

    fn day_with(symbol: &str, closes: &[f64]) -> DayData {
        let day = trading_day();
        let mut series = BTreeMap::new();
        series.insert(
            INDEX_SYMBOL.to_string(),
            candles_from_closes(ist(day, 9, 15), Duration::minutes(3), &[75_000.0; 6]),
        );
        series.insert(
            symbol.to_string(),
            candles_from_closes(ist(day, 9, 15), Duration::minutes(3), closes),
        );
        DayData {
            metadata: None,
            series,
        }
    }

    #[tokio::test]
    async fn open_bars_stay_hidden() {
        let broker = ReplayBroker::new(&[day_with(CE, &[200.0, 205.0, 210.0])], dec!(100000));
        let day = trading_day();
        let token = broker.find_instrument("BFO", CE).await.unwrap().instrument_token;
        let (from, to) = (ist(day, 9, 0), ist(day, 15, 30));

        broker.advance_to(ist(day, 9, 20));
        let bars = broker
            .historical(token, from, to, CandleInterval::ThreeMinute)
            .await
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(broker.ltp(&format!("BFO:{CE}")).await.unwrap(), dec!(200));

        broker.advance_to(ist(day, 9, 24));
        let bars = broker
            .historical(token, from, to, CandleInterval::ThreeMinute)
            .await
            .unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(broker.ltp(CE).await.unwrap(), dec!(210));
    }

    #[tokio::test]
    async fn index_keeps_its_token_and_unknown_symbols_fail() {
        let broker = ReplayBroker::new(&[day_with(CE, &[200.0])], dec!(100000));
        let sensex = broker.find_instrument("BSE", INDEX_SYMBOL).await.unwrap();
        assert_eq!(sensex.instrument_token, SENSEX_TOKEN);
        assert_eq!(broker.find_instrument("BFO", CE).await.unwrap().instrument_type, "CE");
        assert!(matches!(
            broker.find_instrument("BFO", "SENSEX2510975000PE").await,
            Err(Error::Broker(BrokerError::InstrumentNotFound(_)))
        ));
        assert_eq!(broker.available_balance().await.unwrap(), dec!(100000));
    }

    #[tokio::test]
    async fn orders_fill_at_reference_price() {
        let broker = ReplayBroker::new(&[day_with(CE, &[200.0])], dec!(100000));
        let order = OrderRequest::market(
            "BFO",
            CE,
            crate::port::outbound::broker::TransactionType::Buy,
            20,
            dec!(201.5),
        );
        let first = broker.place_order(&order).await.unwrap();
        let second = broker.place_order(&order).await.unwrap();
        assert_eq!(first.order_id, "REPLAY-1");
        assert_eq!(second.order_id, "REPLAY-2");
        assert_eq!(first.fill_price, Some(dec!(201.5)));
    }

    #[test]
    fn summary_tracks_drawdown_and_hold_time() {
        let day = trading_day();
        let mut win = open_position(dec!(200), 20, ist(day, 10, 0));
        win.close(dec!(210), ExitReason::ProfitTarget, ist(day, 10, 30));
        let mut loss = open_position(dec!(200), 20, ist(day, 11, 0));
        loss.close(dec!(185), ExitReason::StopLoss, ist(day, 11, 10));
        assert_eq!(loss.option_type, OptionType::CE);

        let report = ReplayReport::summarize(day, &day_with(CE, &[200.0]), vec![win, loss]);

        assert_eq!(report.total_pnl, dec!(-100));
        assert_eq!(report.win_rate, dec!(50));
        assert_eq!(report.max_drawdown, dec!(300));
        assert_eq!(report.avg_hold_minutes, Some(20.0));
        assert_eq!(report.sensex_open, Some(75_000.0));
    }

    #[tokio::test]
    async fn missing_day_is_an_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = CsvCandleArchive::new(dir.path());
        let err = replay_day(
            &archive,
            trading_day(),
            Arc::new(MemoryStore::new()),
            ReplaySettings {
                limits: RiskLimits::default(),
                engine: EngineSettings::default(),
                calendar: MarketCalendar::default(),
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("no archived data"));
    }

    #[tokio::test]
    async fn collected_day_replays_through_the_engine() {
        let dir = tempfile::tempdir().unwrap();
        let archive: Arc<dyn CandleArchive> = Arc::new(CsvCandleArchive::new(dir.path()));
        let collector = DataCollector::new(
            Arc::new(PaperBroker::synthetic(dec!(100000))),
            Arc::clone(&archive),
            Arc::new(NotifierRegistry::new()),
            MarketCalendar::default(),
            CollectorSettings::default(),
        );
        let day = trading_day();
        let previous = MarketCalendar::default().previous_trading_day(day);
        collector.collect_date(previous, ist(previous, 15, 26)).await.unwrap();
        collector.collect_date(day, ist(day, 15, 26)).await.unwrap();

        let store = Arc::new(MemoryStore::new());
        let report = replay_day(
            archive.as_ref(),
            day,
            store.clone(),
            ReplaySettings {
                limits: RiskLimits::default(),
                engine: EngineSettings::default(),
                calendar: MarketCalendar::default(),
            },
        )
        .await
        .unwrap();

        assert_eq!(report.date, day);
        assert_eq!(report.cycles, 126);
        assert_eq!(report.errors, 0);
        assert!(report.atm_strike.is_some());
        assert!(report.trades.iter().all(|p| !p.is_open()));
        assert!(report.trades.len() <= 3);
        let session = store.session_for_date(day).unwrap().expect("session saved");
        assert!(session.is_finished());
        assert_eq!(session.total_signals, report.signals);
    }
}
