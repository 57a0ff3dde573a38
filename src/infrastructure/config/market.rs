//! Exchange calendar configuration.

use serde::{Deserialize, Serialize};

use crate::domain::MarketCalendar;
use crate::error::ConfigError;

/// `[market]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MarketConfig {
    /// BSE holidays as `YYYY-MM-DD`.
    pub holidays: Vec<String>,
}

impl MarketConfig {
    /// Replace the holiday list from a comma separated string.
    pub fn set_holidays_csv(&mut self, raw: &str) {
        self.holidays = raw
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(String::from)
            .collect();
    }

    pub fn calendar(&self) -> Result<MarketCalendar, ConfigError> {
        MarketCalendar::parse(&self.holidays).map_err(|e| ConfigError::InvalidValue {
            field: "market.holidays",
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn csv_holidays_skip_blanks() {
        let mut market = MarketConfig::default();
        market.set_holidays_csv("2025-01-26, ,2025-03-14,");
        assert_eq!(market.holidays, vec!["2025-01-26", "2025-03-14"]);

        let calendar = market.calendar().unwrap();
        assert_eq!(calendar.holiday_count(), 2);
        assert!(calendar.is_holiday(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()));
    }

    #[test]
    fn malformed_date_is_reported() {
        let market = MarketConfig {
            holidays: vec!["14/03/2025".into()],
        };
        assert!(matches!(
            market.calendar(),
            Err(ConfigError::InvalidValue { field: "market.holidays", .. })
        ));
    }
}
