//! Per-day trading session bookkeeping.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money::Price;

/// Counters for one trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSession {
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// First SENSEX close seen this session.
    pub sensex_entry_price: Option<Price>,
    pub total_signals: u32,
    pub positions_opened: u32,
    pub positions_closed: u32,
    pub total_pnl: Price,
    pub errors: Vec<String>,
}

impl TradingSession {
    #[must_use]
    pub fn new(date: NaiveDate, start_time: DateTime<Utc>) -> Self {
        Self {
            date,
            start_time,
            end_time: None,
            sensex_entry_price: None,
            total_signals: 0,
            positions_opened: 0,
            positions_closed: 0,
            total_pnl: Decimal::ZERO,
            errors: Vec::new(),
        }
    }

    pub fn record_signal(&mut self) {
        self.total_signals += 1;
    }

    pub fn record_open(&mut self) {
        self.positions_opened += 1;
    }

    pub fn record_close(&mut self, pnl: Price) {
        self.positions_closed += 1;
        self.total_pnl += pnl;
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Set the SENSEX entry price once; later calls are ignored.
    pub fn record_sensex_entry(&mut self, price: Price) {
        if self.sensex_entry_price.is_none() {
            self.sensex_entry_price = Some(price);
        }
    }

    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.end_time = Some(at);
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }
}
