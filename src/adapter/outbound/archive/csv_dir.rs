//! Candle archive as a tree of CSV files.
//!
//! ```text
//! <root>/raw_data/2025-01/2025-01-06/SENSEX_2025-01-06.csv
//! <root>/raw_data/2025-01/2025-01-06/metadata.json
//! <root>/archives/2024-09/2024-09-30/...
//! ```
//!
//! Each CSV row is one candle with the 10 and 20 bar EMAs of the close
//! precomputed. Readers ignore the EMA columns.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{ema, Candle};
use crate::error::{Error, Result};
use crate::port::outbound::archive::{CandleArchive, DayData, DayMetadata};

const RAW_DIR: &str = "raw_data";
const ARCHIVE_DIR: &str = "archives";
const METADATA_FILE: &str = "metadata.json";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Serialize, Deserialize)]
struct CandleRow {
    timestamp: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(default)]
    ema10: Option<f64>,
    #[serde(default)]
    ema20: Option<f64>,
}

impl From<CandleRow> for Candle {
    fn from(row: CandleRow) -> Self {
        Self {
            timestamp: row.timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        }
    }
}

/// [`CandleArchive`] over a directory of CSV files.
pub struct CsvCandleArchive {
    root: PathBuf,
}

impl CsvCandleArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn day_dir(&self, tree: &str, date: NaiveDate) -> PathBuf {
        self.root
            .join(tree)
            .join(date.format("%Y-%m").to_string())
            .join(date.format(DATE_FORMAT).to_string())
    }

    /// Raw directory first, then the monthly archive.
    fn existing_day_dir(&self, date: NaiveDate) -> Option<PathBuf> {
        [RAW_DIR, ARCHIVE_DIR]
            .into_iter()
            .map(|tree| self.day_dir(tree, date))
            .find(|dir| dir.is_dir())
    }

    fn dates_in(&self, tree: &str) -> Result<Vec<(NaiveDate, PathBuf)>> {
        let mut dates = Vec::new();
        for month in read_dirs(&self.root.join(tree))? {
            for day in read_dirs(&month)? {
                let parsed = day
                    .file_name()
                    .and_then(|name| name.to_str())
                    .and_then(|name| NaiveDate::parse_from_str(name, DATE_FORMAT).ok());
                if let Some(date) = parsed {
                    dates.push((date, day));
                }
            }
        }
        Ok(dates)
    }
}

/// Sub-directories of `dir`; a missing `dir` has none.
fn read_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    Ok(dirs)
}

fn series_file(date: NaiveDate, symbol: &str) -> String {
    format!("{symbol}_{}.csv", date.format(DATE_FORMAT))
}

fn read_series(path: &Path) -> Result<Vec<Candle>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| Error::Archive(format!("{}: {e}", path.display())))?;
    let mut candles = Vec::new();
    for row in reader.deserialize::<CandleRow>() {
        let row = row.map_err(|e| Error::Archive(format!("{}: {e}", path.display())))?;
        candles.push(Candle::from(row));
    }
    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}

fn read_metadata(dir: &Path) -> Result<Option<DayMetadata>> {
    match fs::read(dir.join(METADATA_FILE)) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl CandleArchive for CsvCandleArchive {
    fn write_series(&self, date: NaiveDate, symbol: &str, candles: &[Candle]) -> Result<()> {
        let dir = self.day_dir(RAW_DIR, date);
        fs::create_dir_all(&dir)?;
        let path = dir.join(series_file(date, symbol));

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let fast = ema(&closes, 10);
        let slow = ema(&closes, 20);

        let mut writer = csv::Writer::from_path(&path)
            .map_err(|e| Error::Archive(format!("{}: {e}", path.display())))?;
        for (i, candle) in candles.iter().enumerate() {
            writer
                .serialize(CandleRow {
                    timestamp: candle.timestamp,
                    open: candle.open,
                    high: candle.high,
                    low: candle.low,
                    close: candle.close,
                    volume: candle.volume,
                    ema10: fast.get(i).copied(),
                    ema20: slow.get(i).copied(),
                })
                .map_err(|e| Error::Archive(format!("{}: {e}", path.display())))?;
        }
        writer.flush()?;
        debug!(symbol, count = candles.len(), path = %path.display(), "Series archived");
        Ok(())
    }

    fn write_metadata(&self, metadata: &DayMetadata) -> Result<()> {
        let dir = self.day_dir(RAW_DIR, metadata.date);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(METADATA_FILE), serde_json::to_vec_pretty(metadata)?)?;
        Ok(())
    }

    fn metadata(&self, date: NaiveDate) -> Result<Option<DayMetadata>> {
        match self.existing_day_dir(date) {
            Some(dir) => read_metadata(&dir),
            None => Ok(None),
        }
    }

    fn load_day(&self, date: NaiveDate) -> Result<Option<DayData>> {
        let Some(dir) = self.existing_day_dir(date) else {
            return Ok(None);
        };
        let suffix = format!("_{}.csv", date.format(DATE_FORMAT));
        let mut series = BTreeMap::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let Some(symbol) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_suffix(&suffix))
            else {
                continue;
            };
            match read_series(&path) {
                Ok(candles) => {
                    series.insert(symbol.to_string(), candles);
                }
                Err(e) => warn!(error = %e, "Skipping unreadable series"),
            }
        }
        Ok(Some(DayData {
            metadata: read_metadata(&dir)?,
            series,
        }))
    }

    fn list_dates(&self, limit: usize) -> Result<Vec<NaiveDate>> {
        let mut dates: Vec<NaiveDate> = self
            .dates_in(RAW_DIR)?
            .into_iter()
            .chain(self.dates_in(ARCHIVE_DIR)?)
            .map(|(date, _)| date)
            .collect();
        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates.dedup();
        dates.truncate(limit);
        Ok(dates)
    }

    fn archive_before(&self, cutoff: NaiveDate) -> Result<Vec<NaiveDate>> {
        let mut moved = Vec::new();
        for (date, dir) in self.dates_in(RAW_DIR)? {
            if date >= cutoff {
                continue;
            }
            let target = self.day_dir(ARCHIVE_DIR, date);
            if target.exists() {
                fs::remove_dir_all(&target)?;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(&dir, &target)?;
            if let Some(month) = dir.parent() {
                // Only succeeds once the month is empty.
                let _ = fs::remove_dir(month);
            }
            moved.push(date);
        }
        moved.sort_unstable();
        if !moved.is_empty() {
            info!(days = moved.len(), cutoff = %cutoff, "Old market data archived");
        }
        Ok(moved)
    }
}
