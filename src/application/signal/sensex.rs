//! Entry and stop rules on the SENSEX index chart.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{ema_conditions, score, SignalConfig};
use crate::domain::{
    CandleSeries, OptionType, SignalCondition, SignalSource, SignalType, TradingSignal,
};

/// Detector on index candles. Signals from here always favour calls.
#[derive(Debug, Clone)]
pub struct SensexSignalDetector {
    config: SignalConfig,
}

impl SensexSignalDetector {
    #[must_use]
    pub const fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Evaluate the latest bar.
    ///
    /// `entry_price` is the index close and `stop_loss` the fast EMA. A
    /// series shorter than the slow EMA span yields `NoSignal`.
    #[must_use]
    pub fn detect_entry(&self, series: &CandleSeries, at: DateTime<Utc>) -> TradingSignal {
        let Some(snapshot) = series.with_emas(self.config.ema_fast, self.config.ema_slow) else {
            debug!(candles = series.len(), "Not enough SENSEX candles");
            return TradingSignal::none(SignalSource::Sensex, at)
                .with_metadata("error", "insufficient candles");
        };

        let mut conditions = ema_conditions(&snapshot, &self.config);
        let volume = snapshot.candle.volume;
        conditions.push(SignalCondition::new(
            "volume",
            volume >= self.config.volume_threshold,
            volume,
            self.config.volume_threshold,
            "volume at or above threshold",
        ));

        let (confidence, all_passed) = score(&conditions, self.config.confidence_base);
        let passed = conditions.iter().filter(|c| c.passed).count();
        let total = conditions.len();

        TradingSignal {
            signal_type: if all_passed {
                SignalType::LongEntry
            } else {
                SignalType::NoSignal
            },
            source: SignalSource::Sensex,
            option_type: Some(OptionType::CE),
            timestamp: at,
            confidence,
            conditions,
            entry_price: snapshot.candle.close,
            stop_loss: snapshot.fast,
            strike: None,
            symbol: None,
            metadata: Default::default(),
        }
        .with_metadata("sensex_price", snapshot.candle.close)
        .with_metadata("ema_fast", format!("{:.2}", snapshot.fast))
        .with_metadata("ema_slow", format!("{:.2}", snapshot.slow))
        .with_metadata("passed_conditions", format!("{passed}/{total}"))
    }

    /// `Exit` when the latest index close is at or below `stop_loss`.
    #[must_use]
    pub fn detect_exit(
        &self,
        series: &CandleSeries,
        stop_loss: f64,
        at: DateTime<Utc>,
    ) -> TradingSignal {
        let Some(last) = series.last() else {
            return TradingSignal::none(SignalSource::Sensex, at);
        };
        let hit = last.close <= stop_loss;
        TradingSignal {
            signal_type: if hit {
                SignalType::Exit
            } else {
                SignalType::NoSignal
            },
            source: SignalSource::Sensex,
            option_type: Some(OptionType::CE),
            timestamp: at,
            confidence: if hit { 1.0 } else { 0.0 },
            conditions: vec![SignalCondition::new(
                "stop_loss",
                hit,
                last.close,
                stop_loss,
                "close at or below stop",
            )],
            entry_price: last.close,
            stop_loss,
            strike: None,
            symbol: None,
            metadata: Default::default(),
        }
    }
}

impl Default for SensexSignalDetector {
    fn default() -> Self {
        Self::new(SignalConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::{candles_from_closes, market_hours};
    use chrono::Duration;

    fn rising(n: usize) -> CandleSeries {
        let closes: Vec<f64> = (0..n).map(|i| 75_000.0 + 2.0 * i as f64).collect();
        CandleSeries::new(candles_from_closes(
            market_hours() - Duration::minutes(3 * n as i64),
            Duration::minutes(3),
            &closes,
        ))
    }

    #[test]
    fn steady_uptrend_is_long_entry() {
        let signal = SensexSignalDetector::default().detect_entry(&rising(30), market_hours());
        assert_eq!(signal.signal_type, SignalType::LongEntry, "{:?}", signal.failed_conditions());
        assert!((signal.confidence - 0.8).abs() < 1e-9);
        assert_eq!(signal.option_type, Some(OptionType::CE));
        assert!((signal.entry_price - 75_058.0).abs() < 1e-9);
        assert!(signal.stop_loss < signal.entry_price);
        assert_eq!(signal.metadata["passed_conditions"], "5/5");
    }

    #[test]
    fn downtrend_fails_cross_and_colour() {
        let closes: Vec<f64> = (0..30).map(|i| 75_000.0 - 2.0 * i as f64).collect();
        let series = CandleSeries::new(candles_from_closes(
            market_hours() - Duration::minutes(90),
            Duration::minutes(3),
            &closes,
        ));
        let signal = SensexSignalDetector::default().detect_entry(&series, market_hours());
        assert_eq!(signal.signal_type, SignalType::NoSignal);
        let failed = signal.failed_conditions();
        assert!(failed.contains(&"green"));
        assert!(failed.contains(&"ema_cross"));
        assert!(!signal.is_valid());
    }

    #[test]
    fn short_history_is_no_signal() {
        let signal = SensexSignalDetector::default().detect_entry(&rising(19), market_hours());
        assert_eq!(signal.signal_type, SignalType::NoSignal);
        assert!(signal.conditions.is_empty());
    }

    #[test]
    fn exit_on_stop() {
        let detector = SensexSignalDetector::default();
        let series = rising(30);
        assert_eq!(
            detector.detect_exit(&series, 75_100.0, market_hours()).signal_type,
            SignalType::Exit
        );
        assert_eq!(
            detector.detect_exit(&series, 75_000.0, market_hours()).signal_type,
            SignalType::NoSignal
        );
    }
}
