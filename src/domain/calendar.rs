//! Indian market calendar in IST.
//!
//! All checks take UTC instants and evaluate them against the exchange's
//! local clock (UTC+05:30, no daylight saving).

use std::collections::BTreeSet;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Timelike, Utc, Weekday,
};

use super::error::DomainError;

/// IST offset from UTC in seconds.
pub const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

const LOGIN_OPEN: u32 = 9 * 3600;
const MARKET_OPEN: u32 = 9 * 3600 + 15 * 60;
const ENTRY_OPEN: u32 = 9 * 3600 + 18 * 60;
const ENTRY_CLOSE: u32 = 15 * 3600 + 15 * 60;
const MARKET_CLOSE: u32 = 15 * 3600 + 30 * 60;
const TOKEN_EXPIRY: u32 = 9 * 3600;

/// The IST fixed offset.
#[must_use]
pub fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Current wall-clock time in IST.
#[must_use]
pub fn now_ist() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&ist())
}

/// Calendar date in IST for a UTC instant.
#[must_use]
pub fn ist_date(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&ist()).date_naive()
}

/// Seconds since IST midnight for a UTC instant.
#[must_use]
pub fn ist_seconds(at: DateTime<Utc>) -> u32 {
    at.with_timezone(&ist()).num_seconds_from_midnight()
}

/// UTC instant for an IST wall-clock time on `date`.
#[must_use]
pub fn ist_instant(date: NaiveDate, seconds_from_midnight: u32) -> DateTime<Utc> {
    let local = NaiveDateTime::new(date, NaiveTime::default())
        + Duration::seconds(i64::from(seconds_from_midnight));
    Utc.from_utc_datetime(&(local - Duration::seconds(i64::from(IST_OFFSET_SECS))))
}

/// Instant at which a Kite access token issued at `issued_at` stops working.
///
/// Tokens are invalidated at 09:00 IST on the following calendar day.
#[must_use]
pub fn token_expiry(issued_at: DateTime<Utc>) -> DateTime<Utc> {
    let next_day = ist_date(issued_at) + Duration::days(1);
    ist_instant(next_day, TOKEN_EXPIRY)
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Trading calendar with exchange holidays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl MarketCalendar {
    /// Create a calendar from a set of holiday dates.
    pub fn new(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    /// Parse holidays given as `YYYY-MM-DD` strings.
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidDate`] for the first unparseable entry.
    pub fn parse<S: AsRef<str>>(dates: &[S]) -> Result<Self, DomainError> {
        let mut holidays = BTreeSet::new();
        for raw in dates {
            let raw = raw.as_ref().trim();
            if raw.is_empty() {
                continue;
            }
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| DomainError::InvalidDate(raw.to_string()))?;
            holidays.insert(date);
        }
        Ok(Self { holidays })
    }

    /// Number of configured holidays.
    #[must_use]
    pub fn holiday_count(&self) -> usize {
        self.holidays.len()
    }

    #[must_use]
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    /// Monday to Friday and not a holiday.
    #[must_use]
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        is_weekday(date) && !self.is_holiday(date)
    }

    /// Regular session, 09:15 to 15:30 IST inclusive.
    #[must_use]
    pub fn is_market_open(&self, at: DateTime<Utc>) -> bool {
        self.within(at, MARKET_OPEN, MARKET_CLOSE)
    }

    /// Window in which new entries may be taken, 09:18 to 15:15 IST.
    #[must_use]
    pub fn is_trading_window(&self, at: DateTime<Utc>) -> bool {
        self.within(at, ENTRY_OPEN, ENTRY_CLOSE)
    }

    /// Window in which an interactive login is offered, 09:00 to 15:30 IST.
    #[must_use]
    pub fn is_login_window(&self, at: DateTime<Utc>) -> bool {
        self.within(at, LOGIN_OPEN, MARKET_CLOSE)
    }

    /// True once the entry window has closed for a trading day.
    #[must_use]
    pub fn is_past_entry_window(&self, at: DateTime<Utc>) -> bool {
        self.is_trading_day(ist_date(at)) && ist_seconds(at) > ENTRY_CLOSE
    }

    /// The most recent trading day strictly before `date`.
    #[must_use]
    pub fn previous_trading_day(&self, date: NaiveDate) -> NaiveDate {
        let mut day = date - Duration::days(1);
        // At most 30 days back.
        for _ in 0..30 {
            if self.is_trading_day(day) {
                return day;
            }
            day -= Duration::days(1);
        }
        day
    }

    /// Whether daily risk counters should roll over at `at`.
    ///
    /// A reset happens on the first check of a weekday at or after 09:15 IST
    /// whose IST date differs from the last reset.
    #[must_use]
    pub fn should_daily_reset(&self, last_reset: Option<NaiveDate>, at: DateTime<Utc>) -> bool {
        let today = ist_date(at);
        last_reset != Some(today) && is_weekday(today) && ist_seconds(at) >= MARKET_OPEN
    }

    fn within(&self, at: DateTime<Utc>, open: u32, close: u32) -> bool {
        let seconds = ist_seconds(at);
        self.is_trading_day(ist_date(at)) && (open..=close).contains(&seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ist_at(d: NaiveDate, h: u32, m: u32) -> DateTime<Utc> {
        ist_instant(d, h * 3600 + m * 60)
    }

    #[test]
    fn ist_instant_applies_offset() {
        let at = ist_at(date(2025, 1, 6), 10, 0);
        assert_eq!(at, Utc.with_ymd_and_hms(2025, 1, 6, 4, 30, 0).unwrap());
        assert_eq!(ist_date(at), date(2025, 1, 6));
    }

    #[test]
    fn market_hours_boundaries() {
        let cal = MarketCalendar::default();
        let monday = date(2025, 1, 6);

        assert!(!cal.is_market_open(ist_at(monday, 9, 14)));
        assert!(cal.is_market_open(ist_at(monday, 9, 15)));
        assert!(cal.is_market_open(ist_at(monday, 15, 30)));
        assert!(!cal.is_market_open(ist_at(monday, 15, 31)));
    }

    #[test]
    fn weekends_and_holidays_are_closed() {
        let cal = MarketCalendar::new([date(2025, 1, 7)]);

        assert!(!cal.is_market_open(ist_at(date(2025, 1, 4), 11, 0)));
        assert!(!cal.is_market_open(ist_at(date(2025, 1, 7), 11, 0)));
        assert!(cal.is_market_open(ist_at(date(2025, 1, 8), 11, 0)));
    }

    #[test]
    fn entry_window_is_narrower_than_session() {
        let cal = MarketCalendar::default();
        let monday = date(2025, 1, 6);

        assert!(!cal.is_trading_window(ist_at(monday, 9, 16)));
        assert!(cal.is_trading_window(ist_at(monday, 9, 18)));
        assert!(cal.is_trading_window(ist_at(monday, 15, 15)));
        assert!(!cal.is_trading_window(ist_at(monday, 15, 20)));
        assert!(cal.is_past_entry_window(ist_at(monday, 15, 20)));
    }

    #[test]
    fn login_window_opens_at_nine() {
        let cal = MarketCalendar::default();
        let monday = date(2025, 1, 6);

        assert!(!cal.is_login_window(ist_at(monday, 8, 59)));
        assert!(cal.is_login_window(ist_at(monday, 9, 0)));
        assert!(!cal.is_login_window(ist_at(date(2025, 1, 5), 10, 0)));
    }

    #[test]
    fn previous_trading_day_skips_weekend_and_holiday() {
        let cal = MarketCalendar::new([date(2025, 1, 3)]);
        // Monday -> Friday is a holiday -> Thursday
        assert_eq!(cal.previous_trading_day(date(2025, 1, 6)), date(2025, 1, 2));
        assert_eq!(cal.previous_trading_day(date(2025, 1, 8)), date(2025, 1, 7));
    }

    #[test]
    fn token_expires_next_morning() {
        let issued = ist_at(date(2025, 1, 6), 9, 20);
        assert_eq!(token_expiry(issued), ist_at(date(2025, 1, 7), 9, 0));

        // Issued late evening still expires the next morning.
        let late = ist_at(date(2025, 1, 6), 23, 50);
        assert_eq!(token_expiry(late), ist_at(date(2025, 1, 7), 9, 0));
    }

    #[test]
    fn daily_reset_after_open_on_new_day() {
        let cal = MarketCalendar::default();
        let monday = date(2025, 1, 6);

        assert!(!cal.should_daily_reset(Some(date(2025, 1, 3)), ist_at(monday, 9, 0)));
        assert!(cal.should_daily_reset(Some(date(2025, 1, 3)), ist_at(monday, 9, 15)));
        assert!(cal.should_daily_reset(None, ist_at(monday, 10, 0)));
        assert!(!cal.should_daily_reset(Some(monday), ist_at(monday, 10, 0)));
        assert!(!cal.should_daily_reset(None, ist_at(date(2025, 1, 4), 10, 0)));
    }

    #[test]
    fn parse_rejects_bad_dates_and_skips_blanks() {
        let cal = MarketCalendar::parse(&["2025-01-26", " ", "2025-03-14"]).unwrap();
        assert_eq!(cal.holiday_count(), 2);

        let err = MarketCalendar::parse(&["26/01/2025"]).unwrap_err();
        assert_eq!(err, DomainError::InvalidDate("26/01/2025".to_string()));
    }
}
