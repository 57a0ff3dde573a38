//! Archive of collected market data, one directory of candles per trading day.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Candle;
use crate::error::Result;

/// Summary written next to a collected day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayMetadata {
    pub date: NaiveDate,
    pub collected_at: DateTime<Utc>,
    pub atm_strike: u32,
    pub strikes: Vec<u32>,
    /// Series written, index included.
    pub files: usize,
    pub sensex_open: Option<f64>,
    pub sensex_close: Option<f64>,
}

/// Everything archived for one trading day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayData {
    pub metadata: Option<DayMetadata>,
    /// Candles per trading symbol, oldest first.
    pub series: BTreeMap<String, Vec<Candle>>,
}

impl DayData {
    #[must_use]
    pub fn candles(&self, symbol: &str) -> Option<&[Candle]> {
        self.series.get(symbol).map(Vec::as_slice)
    }
}

/// Storage for collected candles.
///
/// Recent days live in the raw tree. Days past retention are moved into a
/// per-month archive, where [`CandleArchive::load_day`] still finds them.
pub trait CandleArchive: Send + Sync {
    /// Write one symbol's candles for `date`, replacing any earlier file.
    ///
    /// # Errors
    ///
    /// I/O and encoding failures.
    fn write_series(&self, date: NaiveDate, symbol: &str, candles: &[Candle]) -> Result<()>;

    /// # Errors
    ///
    /// I/O and encoding failures.
    fn write_metadata(&self, metadata: &DayMetadata) -> Result<()>;

    /// Metadata of a collected day, if any.
    ///
    /// # Errors
    ///
    /// I/O and decoding failures.
    fn metadata(&self, date: NaiveDate) -> Result<Option<DayMetadata>>;

    /// The archived day, or `None` when nothing was collected for `date`.
    ///
    /// # Errors
    ///
    /// I/O and decoding failures.
    fn load_day(&self, date: NaiveDate) -> Result<Option<DayData>>;

    /// Collected dates, most recent first.
    ///
    /// # Errors
    ///
    /// I/O failures.
    fn list_dates(&self, limit: usize) -> Result<Vec<NaiveDate>>;

    /// Move every raw day strictly before `cutoff` into its monthly archive.
    ///
    /// Returns the moved dates, oldest first.
    ///
    /// # Errors
    ///
    /// I/O failures.
    fn archive_before(&self, cutoff: NaiveDate) -> Result<Vec<NaiveDate>>;
}
