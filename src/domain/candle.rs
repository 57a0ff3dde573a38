//! OHLCV candles and exponential moving averages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Close above open.
    #[must_use]
    pub fn is_green(&self) -> bool {
        self.close > self.open
    }
}

/// Recursive EMA with `alpha = 2 / (span + 1)`, seeded with the first value.
///
/// The output is aligned with the input. A span of zero is treated as one.
#[must_use]
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span.max(1) as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &value in values {
        let next = match prev {
            Some(p) => alpha * value + (1.0 - alpha) * p,
            None => value,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

/// Candles in chronological order with indicator helpers.
#[derive(Debug, Clone, Default)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

/// Latest candle with the fast and slow EMA at that bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmaSnapshot {
    pub candle: Candle,
    pub fast: f64,
    pub slow: f64,
}

impl CandleSeries {
    /// Build a series, sorting by timestamp.
    #[must_use]
    pub fn new(mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.timestamp);
        Self { candles }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    #[must_use]
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    #[must_use]
    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// EMA values at the latest bar, or `None` when the series is shorter
    /// than the slow span.
    #[must_use]
    pub fn with_emas(&self, fast: usize, slow: usize) -> Option<EmaSnapshot> {
        if self.candles.len() < slow.max(fast).max(1) {
            return None;
        }
        let closes: Vec<f64> = self.candles.iter().map(|c| c.close).collect();
        let fast_ema = *ema(&closes, fast).last()?;
        let slow_ema = *ema(&closes, slow).last()?;
        Some(EmaSnapshot {
            candle: *self.candles.last()?,
            fast: fast_ema,
            slow: slow_ema,
        })
    }
}
