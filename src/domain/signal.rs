//! Trading signal types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Kind of signal emitted by a detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    LongEntry,
    ShortEntry,
    Exit,
    NoSignal,
}

impl SignalType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LongEntry => "LONG_ENTRY",
            Self::ShortEntry => "SHORT_ENTRY",
            Self::Exit => "EXIT",
            Self::NoSignal => "NO_SIGNAL",
        }
    }
}

/// Which detector produced the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    Sensex,
    Option,
    Combined,
}

impl SignalSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sensex => "sensex",
            Self::Option => "option",
            Self::Combined => "combined",
        }
    }
}

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    CE,
    PE,
}

impl OptionType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CE => "CE",
            Self::PE => "PE",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CE" => Ok(Self::CE),
            "PE" => Ok(Self::PE),
            other => Err(DomainError::InvalidOptionType(other.to_string())),
        }
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TimeExit,
    ProfitTarget,
    Manual,
    EndOfDay,
}

impl ExitReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StopLoss => "stop_loss",
            Self::TimeExit => "time_exit",
            Self::ProfitTarget => "profit_target",
            Self::Manual => "manual",
            Self::EndOfDay => "end_of_day",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExitReason {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop_loss" => Ok(Self::StopLoss),
            "time_exit" => Ok(Self::TimeExit),
            "profit_target" => Ok(Self::ProfitTarget),
            "manual" => Ok(Self::Manual),
            "end_of_day" => Ok(Self::EndOfDay),
            other => Err(DomainError::InvalidExitReason(other.to_string())),
        }
    }
}

/// One evaluated rule and its inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalCondition {
    pub name: String,
    pub passed: bool,
    pub value: f64,
    pub threshold: f64,
    pub description: String,
}

impl SignalCondition {
    pub fn new(
        name: impl Into<String>,
        passed: bool,
        value: f64,
        threshold: f64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            passed,
            value,
            threshold,
            description: description.into(),
        }
    }
}

/// A detector's verdict for one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub signal_type: SignalType,
    pub source: SignalSource,
    pub option_type: Option<OptionType>,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub conditions: Vec<SignalCondition>,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub strike: Option<u32>,
    pub symbol: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl TradingSignal {
    /// A signal carrying no trade.
    #[must_use]
    pub fn none(source: SignalSource, timestamp: DateTime<Utc>) -> Self {
        Self {
            signal_type: SignalType::NoSignal,
            source,
            option_type: None,
            timestamp,
            confidence: 0.0,
            conditions: Vec::new(),
            entry_price: 0.0,
            stop_loss: 0.0,
            strike: None,
            symbol: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Actionable: not `NoSignal`, positive confidence and a positive entry.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.signal_type != SignalType::NoSignal && self.confidence > 0.0 && self.entry_price > 0.0
    }

    /// Names of conditions that failed.
    #[must_use]
    pub fn failed_conditions(&self) -> Vec<&str> {
        self.conditions
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_signal_is_not_valid() {
        let signal = TradingSignal::none(SignalSource::Sensex, Utc::now());
        assert!(!signal.is_valid());
    }

    #[test]
    fn entry_requires_confidence_and_price() {
        let mut signal = TradingSignal::none(SignalSource::Sensex, Utc::now());
        signal.signal_type = SignalType::LongEntry;
        signal.confidence = 0.8;
        assert!(!signal.is_valid());

        signal.entry_price = 75_000.0;
        assert!(signal.is_valid());

        signal.confidence = 0.0;
        assert!(!signal.is_valid());
    }

    #[test]
    fn exit_reason_strings_round_trip() {
        for reason in [
            ExitReason::StopLoss,
            ExitReason::TimeExit,
            ExitReason::ProfitTarget,
            ExitReason::Manual,
            ExitReason::EndOfDay,
        ] {
            assert_eq!(reason.as_str().parse::<ExitReason>().unwrap(), reason);
        }
        assert!("target".parse::<ExitReason>().is_err());
    }

    #[test]
    fn option_type_parses_case_insensitively() {
        assert_eq!("ce".parse::<OptionType>().unwrap(), OptionType::CE);
        assert_eq!(" PE ".parse::<OptionType>().unwrap(), OptionType::PE);
        assert!("XX".parse::<OptionType>().is_err());
    }

    #[test]
    fn failed_conditions_lists_names() {
        let mut signal = TradingSignal::none(SignalSource::Option, Utc::now());
        signal.conditions = vec![
            SignalCondition::new("green", true, 1.0, 0.0, "close > open"),
            SignalCondition::new("ema_gap", false, 30.0, 15.0, "gap too wide"),
        ];
        assert_eq!(signal.failed_conditions(), vec!["ema_gap"]);
    }
}
