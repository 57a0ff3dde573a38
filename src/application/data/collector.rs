//! End-of-day collection of SENSEX and option candles.
//!
//! After the close the day's index bars and the 3-minute bars of every
//! weekly call and put within ±500 points of the closing ATM strike are
//! pulled through the [`Broker`] port and written to a [`CandleArchive`].

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc, Weekday};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::calendar::{ist_date, ist_instant, ist_seconds};
use crate::domain::{
    option_symbol, select_strike, strike_ladder, weekly_expiry, Candle, MarketCalendar, OptionType,
    StrikeSlot, INDEX_SYMBOL, OPTIONS_EXCHANGE, SENSEX_TOKEN,
};
use crate::error::{Error, Result};
use crate::port::outbound::archive::{CandleArchive, DayMetadata};
use crate::port::outbound::broker::{Broker, CandleInterval};
use crate::port::outbound::notifier::{CollectionEvent, Event, NotifierRegistry};

pub(crate) const MARKET_OPEN_SECS: u32 = 9 * 3600 + 15 * 60;
pub(crate) const MARKET_CLOSE_SECS: u32 = 15 * 3600 + 30 * 60;
const COLLECT_FROM_SECS: u32 = 15 * 3600 + 25 * 60;

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub interval: CandleInterval,
    pub expiry_weekday: Weekday,
    /// Days kept in the raw tree.
    pub retention_days: u32,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            interval: CandleInterval::ThreeMinute,
            expiry_weekday: Weekday::Thu,
            retention_days: 90,
        }
    }
}

/// Result of collecting one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionReport {
    pub metadata: DayMetadata,
    /// Series the day should have had: the index plus a call and a put per strike.
    pub expected: usize,
    /// Option symbols that could not be fetched.
    pub missing: Vec<String>,
}

pub struct DataCollector {
    broker: Arc<dyn Broker>,
    archive: Arc<dyn CandleArchive>,
    notifier: Arc<NotifierRegistry>,
    calendar: MarketCalendar,
    settings: CollectorSettings,
}

impl DataCollector {
    pub fn new(
        broker: Arc<dyn Broker>,
        archive: Arc<dyn CandleArchive>,
        notifier: Arc<NotifierRegistry>,
        calendar: MarketCalendar,
        settings: CollectorSettings,
    ) -> Self {
        Self {
            broker,
            archive,
            notifier,
            calendar,
            settings,
        }
    }

    #[must_use]
    pub fn archive(&self) -> &Arc<dyn CandleArchive> {
        &self.archive
    }

    /// True between 15:25 and 15:30 IST on a trading day.
    #[must_use]
    pub fn should_collect(&self, at: DateTime<Utc>) -> bool {
        let secs = ist_seconds(at);
        self.calendar.is_trading_day(ist_date(at))
            && (COLLECT_FROM_SECS..=MARKET_CLOSE_SECS).contains(&secs)
    }

    /// Collect `date` once inside the collection window, then apply retention.
    ///
    /// Returns `None` outside the window or when the day is already archived.
    ///
    /// # Errors
    ///
    /// Index data or archive failures.
    pub async fn run_scheduled(&self, at: DateTime<Utc>) -> Result<Option<CollectionReport>> {
        if !self.should_collect(at) {
            return Ok(None);
        }
        let date = ist_date(at);
        if self.archive.metadata(date)?.is_some() {
            debug!(date = %date, "Day already collected");
            return Ok(None);
        }
        let report = self.collect_date(date, at).await?;
        self.cleanup(at)?;
        Ok(Some(report))
    }

    /// Fetch and archive every series for `date`.
    ///
    /// A missing option series is logged and skipped. The index series is
    /// required.
    ///
    /// # Errors
    ///
    /// No index candles for `date`, broker failures on the index, or archive
    /// write failures.
    pub async fn collect_date(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<CollectionReport> {
        let from = ist_instant(date, MARKET_OPEN_SECS);
        let to = ist_instant(date, MARKET_CLOSE_SECS);
        info!(date = %date, "Collecting market data");

        let sensex = self
            .broker
            .historical(SENSEX_TOKEN, from, to, self.settings.interval)
            .await?;
        let (Some(first), Some(last)) = (sensex.first(), sensex.last()) else {
            return Err(Error::Archive(format!("no SENSEX candles for {date}")));
        };
        let (sensex_open, sensex_close) = (first.open, last.close);
        self.archive.write_series(date, INDEX_SYMBOL, &sensex)?;

        let atm_strike = select_strike(sensex_close, StrikeSlot::Morning);
        let strikes = strike_ladder(atm_strike);
        let expiry = weekly_expiry(to, self.settings.expiry_weekday);
        let expected = 1 + strikes.len() * 2;

        let mut files = 1;
        let mut missing = Vec::new();
        for &strike in &strikes {
            for option_type in [OptionType::CE, OptionType::PE] {
                let symbol = option_symbol(expiry, strike, option_type);
                match self.option_series(&symbol, from, to).await {
                    Ok(candles) if !candles.is_empty() => {
                        self.archive.write_series(date, &symbol, &candles)?;
                        files += 1;
                    }
                    Ok(_) => {
                        warn!(symbol = %symbol, "No candles returned");
                        missing.push(symbol);
                    }
                    Err(e) => {
                        warn!(symbol = %symbol, error = %e, "Option data unavailable");
                        missing.push(symbol);
                    }
                }
            }
        }

        let metadata = DayMetadata {
            date,
            collected_at: now,
            atm_strike,
            strikes,
            files,
            sensex_open: Some(sensex_open),
            sensex_close: Some(sensex_close),
        };
        self.archive.write_metadata(&metadata)?;
        info!(date = %date, files, expected, atm = atm_strike, "Market data collected");

        self.notifier
            .notify_all(Event::DataCollected(CollectionEvent {
                date,
                files,
                expected,
                atm_strike,
                sensex_open: metadata.sensex_open,
                sensex_close: metadata.sensex_close,
            }));
        Ok(CollectionReport {
            metadata,
            expected,
            missing,
        })
    }

    async fn option_series(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let instrument = self.broker.find_instrument(OPTIONS_EXCHANGE, symbol).await?;
        self.broker
            .historical(instrument.instrument_token, from, to, self.settings.interval)
            .await
    }

    /// Move raw days older than the retention period into the monthly archive.
    ///
    /// # Errors
    ///
    /// Archive I/O failures.
    pub fn cleanup(&self, now: DateTime<Utc>) -> Result<Vec<NaiveDate>> {
        let cutoff = ist_date(now) - Duration::days(i64::from(self.settings.retention_days));
        let moved = self.archive.archive_before(cutoff)?;
        if !moved.is_empty() {
            info!(count = moved.len(), cutoff = %cutoff, "Archived old market data");
        }
        Ok(moved)
    }
}
