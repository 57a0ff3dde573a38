//! Entry and exit rules on option premium candles.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{ema_conditions, score, SignalConfig};
use crate::domain::money::price_to_f64;
use crate::domain::{
    CandleSeries, ExitReason, OptionType, Position, SignalCondition, SignalSource, SignalType,
    TradingSignal,
};

/// Result of the exit rules for an open position.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitCheck {
    /// First rule that fired, in priority order.
    pub reason: Option<ExitReason>,
    pub signal: TradingSignal,
}

impl ExitCheck {
    #[must_use]
    pub fn should_exit(&self) -> bool {
        self.reason.is_some()
    }
}

/// Detector on a single option contract.
#[derive(Debug, Clone)]
pub struct OptionSignalDetector {
    config: SignalConfig,
}

impl OptionSignalDetector {
    #[must_use]
    pub const fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    /// EMA rules plus the premium band.
    #[must_use]
    pub fn detect_entry(
        &self,
        series: &CandleSeries,
        option_type: OptionType,
        symbol: &str,
        strike: u32,
        at: DateTime<Utc>,
    ) -> TradingSignal {
        let Some(snapshot) = series.with_emas(self.config.ema_fast, self.config.ema_slow) else {
            debug!(symbol, candles = series.len(), "Not enough option candles");
            let mut none = TradingSignal::none(SignalSource::Option, at)
                .with_metadata("error", "insufficient candles");
            none.option_type = Some(option_type);
            none.symbol = Some(symbol.to_string());
            none.strike = Some(strike);
            return none;
        };

        let premium = snapshot.candle.close;
        let mut conditions = ema_conditions(&snapshot, &self.config);
        conditions.push(SignalCondition::new(
            "premium",
            (self.config.min_premium..=self.config.max_premium).contains(&premium),
            premium,
            self.config.max_premium,
            format!(
                "premium within {}..={}",
                self.config.min_premium, self.config.max_premium
            ),
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
            source: SignalSource::Option,
            option_type: Some(option_type),
            timestamp: at,
            confidence,
            conditions,
            entry_price: premium,
            stop_loss: snapshot.fast,
            strike: Some(strike),
            symbol: Some(symbol.to_string()),
            metadata: Default::default(),
        }
        .with_metadata("option_price", premium)
        .with_metadata("ema_fast", format!("{:.2}", snapshot.fast))
        .with_metadata("ema_slow", format!("{:.2}", snapshot.slow))
        .with_metadata("passed_conditions", format!("{passed}/{total}"))
    }

    /// Stop, then time, then profit target.
    ///
    /// Uses the latest close in `series` and the position's own
    /// `candle_count`; an empty series never exits.
    #[must_use]
    pub fn detect_exit(
        &self,
        series: &CandleSeries,
        position: &Position,
        at: DateTime<Utc>,
    ) -> ExitCheck {
        let Some(last) = series.last() else {
            return ExitCheck {
                reason: None,
                signal: TradingSignal::none(SignalSource::Option, at),
            };
        };

        let price = last.close;
        let entry = price_to_f64(position.entry_price);
        let stop = price_to_f64(position.stop_loss);
        let gain_pct = if entry > 0.0 {
            (price - entry) / entry * 100.0
        } else {
            0.0
        };

        let stop_hit = price <= stop;
        let time_hit = position.candle_count >= self.config.time_exit_candles;
        let target_hit = gain_pct >= self.config.profit_target_pct;

        let reason = if stop_hit {
            Some(ExitReason::StopLoss)
        } else if time_hit {
            Some(ExitReason::TimeExit)
        } else if target_hit {
            Some(ExitReason::ProfitTarget)
        } else {
            None
        };

        let conditions = vec![
            SignalCondition::new("stop_loss", stop_hit, price, stop, "premium at or below stop"),
            SignalCondition::new(
                "time_exit",
                time_hit,
                f64::from(position.candle_count),
                f64::from(self.config.time_exit_candles),
                "held for the maximum number of candles",
            ),
            SignalCondition::new(
                "profit_target",
                target_hit,
                gain_pct,
                self.config.profit_target_pct,
                "gain at or above target",
            ),
        ];

        let signal = TradingSignal {
            signal_type: if reason.is_some() {
                SignalType::Exit
            } else {
                SignalType::NoSignal
            },
            source: SignalSource::Option,
            option_type: Some(position.option_type),
            timestamp: at,
            confidence: if reason.is_some() { 1.0 } else { 0.0 },
            conditions,
            entry_price: price,
            stop_loss: stop,
            strike: Some(position.strike),
            symbol: Some(position.symbol.clone()),
            metadata: Default::default(),
        }
        .with_metadata("exit_reason", reason.map_or("none", ExitReason::as_str))
        .with_metadata("pnl_percent", format!("{gain_pct:.1}"))
        .with_metadata("candle_count", position.candle_count);

        ExitCheck { reason, signal }
    }
}

impl Default for OptionSignalDetector {
    fn default() -> Self {
        Self::new(SignalConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewPosition;
    use crate::testkit::domain::{candles_from_closes, market_hours};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn series(closes: &[f64]) -> CandleSeries {
        CandleSeries::new(candles_from_closes(
            market_hours() - Duration::minutes(3 * closes.len() as i64),
            Duration::minutes(3),
            closes,
        ))
    }

    fn rising_premium(start: f64, step: f64, n: usize) -> CandleSeries {
        let closes: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
        series(&closes)
    }

    fn position(candle_count: u32) -> Position {
        let mut p = Position::open(
            NewPosition {
                symbol: "SENSEX2510975000CE".into(),
                option_type: OptionType::CE,
                strike: 75_000,
                entry_price: dec!(200),
                entry_basis: dec!(75000),
                stop_loss: dec!(190),
                quantity: 20,
            },
            market_hours(),
        )
        .unwrap();
        p.candle_count = candle_count;
        p
    }

    #[test]
    fn entry_requires_premium_band() {
        let detector = OptionSignalDetector::default();
        let ok = detector.detect_entry(
            &rising_premium(200.0, 0.5, 30),
            OptionType::PE,
            "SENSEX2510975000PE",
            75_000,
            market_hours(),
        );
        assert_eq!(ok.signal_type, SignalType::LongEntry, "{:?}", ok.failed_conditions());
        assert_eq!(ok.option_type, Some(OptionType::PE));
        assert_eq!(ok.strike, Some(75_000));

        let cheap = detector.detect_entry(
            &rising_premium(1.0, 0.1, 30),
            OptionType::CE,
            "SENSEX2510975000CE",
            75_000,
            market_hours(),
        );
        assert_eq!(cheap.failed_conditions(), vec!["premium"]);
        assert!((cheap.confidence - 0.64).abs() < 1e-9);
    }

    #[test]
    fn stop_beats_time_exit() {
        let check = OptionSignalDetector::default().detect_exit(
            &series(&[195.0, 185.0]),
            &position(12),
            market_hours(),
        );
        assert_eq!(check.reason, Some(ExitReason::StopLoss));
        assert_eq!(check.signal.metadata["exit_reason"], "stop_loss");
    }

    #[test]
    fn time_exit_after_ten_candles() {
        let detector = OptionSignalDetector::default();
        let flat = series(&[205.0, 205.0]);
        assert_eq!(
            detector.detect_exit(&flat, &position(10), market_hours()).reason,
            Some(ExitReason::TimeExit)
        );
        assert!(!detector
            .detect_exit(&flat, &position(9), market_hours())
            .should_exit());
    }

    #[test]
    fn profit_target_at_twenty_percent() {
        let check = OptionSignalDetector::default().detect_exit(
            &series(&[230.0, 240.0]),
            &position(3),
            market_hours(),
        );
        assert_eq!(check.reason, Some(ExitReason::ProfitTarget));
    }

    #[test]
    fn empty_series_never_exits() {
        let check = OptionSignalDetector::default().detect_exit(
            &CandleSeries::default(),
            &position(20),
            market_hours(),
        );
        assert!(!check.should_exit());
    }
}
