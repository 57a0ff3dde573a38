//! SENSEX option instruments: strike selection and trading symbols.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use super::calendar::{ist_date, ist_seconds};
use super::signal::OptionType;

/// Derivatives segment that lists SENSEX options.
pub const OPTIONS_EXCHANGE: &str = "BFO";
/// Cash segment that lists the index itself.
pub const INDEX_EXCHANGE: &str = "BSE";
/// Trading symbol of the index on [`INDEX_EXCHANGE`].
pub const INDEX_SYMBOL: &str = "SENSEX";
/// Kite instrument token of `BSE:SENSEX`.
pub const SENSEX_TOKEN: u64 = 265;

const STRIKE_STEP: i64 = 100;
const LADDER_WIDTH: i64 = 500;
const AFTERNOON_OFFSET: f64 = 175.0;
const NOON: u32 = 12 * 3600;

/// Time-of-day bucket that decides how far from spot the strike sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrikeSlot {
    Morning,
    Afternoon,
}

impl StrikeSlot {
    /// Morning before 12:00 IST, afternoon from 12:00.
    #[must_use]
    pub fn at(at: DateTime<Utc>) -> Self {
        if ist_seconds(at) < NOON {
            Self::Morning
        } else {
            Self::Afternoon
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
        }
    }
}

/// Strike for an index level in the given slot.
///
/// Morning rounds down to the nearest 100; afternoon first shifts the level
/// 175 points lower.
#[must_use]
pub fn select_strike(index_price: f64, slot: StrikeSlot) -> u32 {
    let base = match slot {
        StrikeSlot::Morning => index_price,
        StrikeSlot::Afternoon => index_price - AFTERNOON_OFFSET,
    };
    let strike = (base / STRIKE_STEP as f64).floor() as i64 * STRIKE_STEP;
    u32::try_from(strike.max(0)).unwrap_or(0)
}

/// Strikes within ±500 of `target`, in steps of 100, ascending.
#[must_use]
pub fn strike_ladder(target: u32) -> Vec<u32> {
    let target = i64::from(target);
    (-LADDER_WIDTH..=LADDER_WIDTH)
        .step_by(STRIKE_STEP as usize)
        .filter_map(|offset| u32::try_from(target + offset).ok())
        .collect()
}

/// Kite trading symbol for a weekly SENSEX option.
///
/// Format is `SENSEX{yy}{m}{dd}{strike}{CE|PE}` where the month has no
/// padding and the day is zero-padded.
#[must_use]
pub fn option_symbol(expiry: NaiveDate, strike: u32, option_type: OptionType) -> String {
    format!(
        "SENSEX{:02}{}{:02}{}{}",
        expiry.year() % 100,
        expiry.month(),
        expiry.day(),
        strike,
        option_type
    )
}

/// Next weekly expiry on `weekday` at or after `at`.
///
/// On expiry day after the close the following week is used.
#[must_use]
pub fn weekly_expiry(at: DateTime<Utc>, weekday: Weekday) -> NaiveDate {
    let today = ist_date(at);
    let ahead = (7 + i64::from(weekday.num_days_from_monday())
        - i64::from(today.weekday().num_days_from_monday()))
        % 7;
    let after_close = ist_seconds(at) > 15 * 3600 + 30 * 60;
    let days = if ahead == 0 && after_close { 7 } else { ahead };
    today + Duration::days(days)
}
