//! Strategy and cycle configuration.

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::application::signal::SignalConfig;
use crate::application::trading::EngineSettings;
use crate::domain::SENSEX_TOKEN;
use crate::error::ConfigError;
use crate::port::outbound::broker::CandleInterval;

/// `[strategy]` section. Signal thresholds sit directly in the table.
///
/// ```toml
/// [strategy]
/// lots = 1
/// interval_minutes = 3
/// expiry_weekday = "thu"
/// ema_gap_threshold = 15.0
/// min_confidence = 0.8
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub lots: u32,
    pub interval_minutes: u32,
    /// Weekly expiry day, e.g. `thu` or `Tuesday`.
    pub expiry_weekday: String,
    #[serde(flatten)]
    pub signal: SignalConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            lots: 1,
            interval_minutes: 3,
            expiry_weekday: "thu".into(),
            signal: SignalConfig::default(),
        }
    }
}

impl StrategyConfig {
    pub fn interval(&self) -> Result<CandleInterval, ConfigError> {
        match self.interval_minutes {
            1 => Ok(CandleInterval::Minute),
            3 => Ok(CandleInterval::ThreeMinute),
            5 => Ok(CandleInterval::FiveMinute),
            15 => Ok(CandleInterval::FifteenMinute),
            other => Err(ConfigError::InvalidValue {
                field: "strategy.interval_minutes",
                reason: format!("{other} is not one of 1, 3, 5, 15"),
            }),
        }
    }

    pub fn expiry_weekday(&self) -> Result<Weekday, ConfigError> {
        self.expiry_weekday
            .trim()
            .parse::<Weekday>()
            .map_err(|_| ConfigError::InvalidValue {
                field: "strategy.expiry_weekday",
                reason: format!("`{}` is not a weekday", self.expiry_weekday),
            })
    }

    /// Check ranges that deserialization cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| ConfigError::InvalidValue {
            field,
            reason: reason.to_string(),
        };
        if self.lots == 0 {
            return Err(invalid("strategy.lots", "must be >= 1"));
        }
        self.interval()?;
        self.expiry_weekday()?;

        let signal = &self.signal;
        if signal.ema_fast == 0 || signal.ema_fast >= signal.ema_slow {
            return Err(invalid(
                "strategy.ema_fast",
                "must be >= 1 and below strategy.ema_slow",
            ));
        }
        if signal.min_premium < 0.0 || signal.max_premium <= signal.min_premium {
            return Err(invalid(
                "strategy.max_premium",
                "must be above strategy.min_premium",
            ));
        }
        if !(0.0..=1.0).contains(&signal.min_confidence) {
            return Err(invalid("strategy.min_confidence", "must be between 0 and 1"));
        }
        if signal.profit_target_pct <= 0.0 {
            return Err(invalid("strategy.profit_target_pct", "must be positive"));
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        Ok(EngineSettings {
            lots: self.lots,
            index_token: SENSEX_TOKEN,
            interval: self.interval()?,
            expiry_weekday: self.expiry_weekday()?,
            signal: self.signal.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build_three_minute_thursday_settings() {
        let settings = StrategyConfig::default().engine_settings().unwrap();
        assert_eq!(settings.interval, CandleInterval::ThreeMinute);
        assert_eq!(settings.expiry_weekday, Weekday::Thu);
        assert_eq!(settings.signal, SignalConfig::default());
    }

    #[test]
    fn flattened_signal_thresholds() {
        let config: StrategyConfig = toml::from_str(
            r#"
            lots = 2
            expiry_weekday = "Tuesday"
            ema_gap_threshold = 12.5
            min_confidence = 0.75
            "#,
        )
        .unwrap();
        assert_eq!(config.lots, 2);
        assert_eq!(config.expiry_weekday().unwrap(), Weekday::Tue);
        assert!((config.signal.ema_gap_threshold - 12.5).abs() < f64::EPSILON);
        assert_eq!(config.signal.ema_slow, 20);
    }

    #[test]
    fn rejects_bad_interval_and_weekday() {
        let config = StrategyConfig {
            interval_minutes: 4,
            ..StrategyConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "strategy.interval_minutes", .. })
        ));

        let config = StrategyConfig {
            expiry_weekday: "someday".into(),
            ..StrategyConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "strategy.expiry_weekday", .. })
        ));
    }

    #[test]
    fn fast_ema_must_be_shorter() {
        let mut config = StrategyConfig::default();
        config.signal.ema_fast = 20;
        assert!(config.validate().is_err());
    }
}
