use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// How orders and market data are sourced.
///
/// - `Test`: synthetic candles, simulated fills.
/// - `Paper`: real Kite data, simulated fills.
/// - `Live`: real data and real orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    #[default]
    Test,
    Paper,
    Live,
}

impl TradingMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Paper => "paper",
            Self::Live => "live",
        }
    }

    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }

    /// Whether the Kite API is needed for market data.
    #[must_use]
    pub const fn uses_real_data(self) -> bool {
        !matches!(self, Self::Test)
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradingMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" => Ok(Self::Test),
            "paper" => Ok(Self::Paper),
            "live" => Ok(Self::Live),
            _ => Err(DomainError::InvalidMode(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("LIVE".parse::<TradingMode>().unwrap(), TradingMode::Live);
        assert_eq!(" Paper ".parse::<TradingMode>().unwrap(), TradingMode::Paper);
        assert!(matches!(
            "demo".parse::<TradingMode>(),
            Err(DomainError::InvalidMode(_))
        ));
    }

    #[test]
    fn only_test_mode_skips_real_data() {
        assert!(!TradingMode::Test.uses_real_data());
        assert!(TradingMode::Paper.uses_real_data());
        assert!(TradingMode::Live.is_live());
    }
}
