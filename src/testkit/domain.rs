//! Builders for domain primitives used across tests.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::domain::calendar::ist_instant;
use crate::domain::{Candle, NewPosition, OptionType, Position};

/// A calendar date. Panics on an invalid date.
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// UTC instant for an IST wall-clock time.
pub fn ist(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    ist_instant(date, hour * 3600 + minute * 60)
}

/// A Monday that is a regular trading day.
pub fn trading_day() -> NaiveDate {
    date(2025, 1, 6)
}

/// 10:30 IST on [`trading_day`].
pub fn market_hours() -> DateTime<Utc> {
    ist(trading_day(), 10, 30)
}

/// A candle with explicit open and close; high and low bracket both.
pub fn candle(at: DateTime<Utc>, open: f64, close: f64) -> Candle {
    Candle {
        timestamp: at,
        open,
        high: open.max(close) + 1.0,
        low: open.min(close) - 1.0,
        close,
        volume: 1_000.0,
    }
}

/// `closes.len()` consecutive candles `step` apart, each opening at the
/// previous close.
pub fn candles_from_closes(start: DateTime<Utc>, step: Duration, closes: &[f64]) -> Vec<Candle> {
    let mut prev = closes.first().copied().unwrap_or_default();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let at = start + step * i32::try_from(i).unwrap_or(i32::MAX);
            let c = candle(at, prev, close);
            prev = close;
            c
        })
        .collect()
}

/// An open call position.
pub fn open_position(entry: Decimal, quantity: u32, at: DateTime<Utc>) -> Position {
    Position::open(
        NewPosition {
            symbol: "SENSEX2510975000CE".into(),
            option_type: OptionType::CE,
            strike: 75_000,
            entry_price: entry,
            entry_basis: Decimal::from(75_000),
            stop_loss: Decimal::from(74_950),
            quantity,
        },
        at,
    )
    .expect("valid position")
}
