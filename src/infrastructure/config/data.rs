//! Market data collection configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// `[data]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DataConfig {
    /// Collect the day's candles after the close while `run` is active.
    pub enabled: bool,
    /// Root of the raw and archived candle trees.
    pub dir: String,
    /// Days kept in the raw tree before moving to the monthly archive.
    pub retention_days: u32,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: "option_data".into(),
            retention_days: 90,
        }
    }
}

impl DataConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dir.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "data.dir" });
        }
        if self.retention_days == 0 {
            return Err(ConfigError::InvalidValue {
                field: "data.retention_days",
                reason: "must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(DataConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_retention_is_rejected() {
        let data = DataConfig {
            retention_days: 0,
            ..DataConfig::default()
        };
        assert!(matches!(
            data.validate(),
            Err(ConfigError::InvalidValue { field: "data.retention_days", .. })
        ));
    }
}
