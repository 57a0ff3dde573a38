//! Combines detector output into at most one entry per cycle.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use super::{ExitCheck, OptionSignalDetector, SensexSignalDetector, SignalConfig};
use crate::domain::{CandleSeries, OptionType, Position, SignalSource, TradingSignal};

/// One option contract and its candles.
#[derive(Debug, Clone, Copy)]
pub struct OptionLeg<'a> {
    pub symbol: &'a str,
    pub series: &'a CandleSeries,
}

/// Aggregate view of a batch of signals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignalSummary {
    pub total_signals: usize,
    pub signal_types: Vec<String>,
    pub option_types: Vec<String>,
    pub sources: Vec<String>,
    pub avg_confidence: f64,
    pub max_confidence: f64,
    pub symbols: Vec<String>,
}

pub struct SignalOrchestrator {
    sensex: SensexSignalDetector,
    option: OptionSignalDetector,
    min_confidence: f64,
    cooldown: Duration,
    last_signal_time: Option<DateTime<Utc>>,
}

impl SignalOrchestrator {
    #[must_use]
    pub fn new(config: SignalConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            cooldown: Duration::minutes(config.cooldown_minutes),
            sensex: SensexSignalDetector::new(config.clone()),
            option: OptionSignalDetector::new(config),
            last_signal_time: None,
        }
    }

    #[must_use]
    pub const fn sensex(&self) -> &SensexSignalDetector {
        &self.sensex
    }

    #[must_use]
    pub const fn option(&self) -> &OptionSignalDetector {
        &self.option
    }

    #[must_use]
    pub const fn last_signal_time(&self) -> Option<DateTime<Utc>> {
        self.last_signal_time
    }

    /// Run every detector for one cycle and resolve the result.
    ///
    /// The SENSEX signal is tagged with the call leg's symbol and `strike`.
    pub fn detect_entry(
        &mut self,
        sensex: &CandleSeries,
        call: Option<OptionLeg<'_>>,
        put: Option<OptionLeg<'_>>,
        strike: u32,
        at: DateTime<Utc>,
    ) -> Vec<TradingSignal> {
        let mut candidates = Vec::with_capacity(3);

        let mut index = self.sensex.detect_entry(sensex, at);
        index.strike = Some(strike);
        index.symbol = call.map(|leg| leg.symbol.to_string());
        candidates.push(index);

        if let Some(leg) = call {
            candidates.push(
                self.option
                    .detect_entry(leg.series, OptionType::CE, leg.symbol, strike, at),
            );
        }
        if let Some(leg) = put {
            candidates.push(
                self.option
                    .detect_entry(leg.series, OptionType::PE, leg.symbol, strike, at),
            );
        }

        let accepted: Vec<TradingSignal> = candidates
            .into_iter()
            .filter(|s| s.is_valid() && s.confidence >= self.min_confidence)
            .collect();
        for s in &accepted {
            info!(
                source = s.source.as_str(),
                option_type = ?s.option_type,
                confidence = s.confidence,
                "Entry signal"
            );
        }
        self.resolve(accepted, at)
    }

    /// Apply the cooldown, the confidence floor and the CE/PE tie-break.
    pub fn resolve(&mut self, signals: Vec<TradingSignal>, at: DateTime<Utc>) -> Vec<TradingSignal> {
        if signals.is_empty() {
            return signals;
        }
        if let Some(last) = self.last_signal_time {
            if at - last < self.cooldown {
                info!(since = %last, "Signal cooldown active");
                return Vec::new();
            }
        }

        let strong: Vec<TradingSignal> = signals
            .into_iter()
            .filter(|s| s.confidence >= self.min_confidence)
            .collect();
        let (calls, puts): (Vec<_>, Vec<_>) = strong
            .into_iter()
            .partition(|s| s.option_type != Some(OptionType::PE));

        let resolved = match (best(&calls).cloned(), best(&puts).cloned()) {
            (Some(ce), Some(pe)) => {
                let pick = if ce.confidence > pe.confidence {
                    ce
                } else if pe.confidence > ce.confidence {
                    pe
                } else if pe.source == SignalSource::Sensex && ce.source != SignalSource::Sensex {
                    pe
                } else {
                    ce
                };
                info!(
                    option_type = ?pick.option_type,
                    confidence = pick.confidence,
                    "CE/PE conflict resolved"
                );
                vec![pick]
            }
            (Some(_), None) => calls,
            (None, Some(_)) => puts,
            (None, None) => Vec::new(),
        };

        if !resolved.is_empty() {
            self.last_signal_time = Some(at);
        }
        resolved
    }

    /// Option exit rules for `position`.
    #[must_use]
    pub fn detect_exit(
        &self,
        position: &Position,
        option: &CandleSeries,
        at: DateTime<Utc>,
    ) -> ExitCheck {
        let check = self.option.detect_exit(option, position, at);
        if let Some(reason) = check.reason {
            info!(symbol = %position.symbol, reason = %reason, "Exit signal");
        }
        check
    }

    #[must_use]
    pub fn summary(signals: &[TradingSignal]) -> SignalSummary {
        if signals.is_empty() {
            return SignalSummary::default();
        }
        let mut symbols: Vec<String> = signals.iter().filter_map(|s| s.symbol.clone()).collect();
        symbols.sort();
        symbols.dedup();
        SignalSummary {
            total_signals: signals.len(),
            signal_types: signals.iter().map(|s| s.signal_type.as_str().to_string()).collect(),
            option_types: signals
                .iter()
                .filter_map(|s| s.option_type.map(|o| o.to_string()))
                .collect(),
            sources: signals.iter().map(|s| s.source.as_str().to_string()).collect(),
            avg_confidence: signals.iter().map(|s| s.confidence).sum::<f64>()
                / signals.len() as f64,
            max_confidence: signals.iter().map(|s| s.confidence).fold(0.0, f64::max),
            symbols,
        }
    }
}

impl Default for SignalOrchestrator {
    fn default() -> Self {
        Self::new(SignalConfig::default())
    }
}

/// Highest confidence; among equals a SENSEX signal, then the first.
fn best(signals: &[TradingSignal]) -> Option<&TradingSignal> {
    signals.iter().fold(None, |acc: Option<&TradingSignal>, s| match acc {
        Some(a) if a.confidence > s.confidence => Some(a),
        Some(a)
            if a.confidence == s.confidence
                && (a.source == SignalSource::Sensex || s.source != SignalSource::Sensex) =>
        {
            Some(a)
        }
        _ => Some(s),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SignalType;
    use crate::testkit::domain::market_hours;

    fn signal(source: SignalSource, option_type: OptionType, confidence: f64) -> TradingSignal {
        let mut s = TradingSignal::none(source, market_hours());
        s.signal_type = SignalType::LongEntry;
        s.option_type = Some(option_type);
        s.confidence = confidence;
        s.entry_price = 100.0;
        s
    }

    #[test]
    fn higher_confidence_wins_conflict() {
        let mut o = SignalOrchestrator::default();
        let out = o.resolve(
            vec![
                signal(SignalSource::Option, OptionType::CE, 0.8),
                signal(SignalSource::Option, OptionType::PE, 0.9),
            ],
            market_hours(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].option_type, Some(OptionType::PE));
    }

    #[test]
    fn tie_prefers_sensex_then_call() {
        let mut o = SignalOrchestrator::default();
        let out = o.resolve(
            vec![
                signal(SignalSource::Option, OptionType::CE, 0.8),
                signal(SignalSource::Sensex, OptionType::CE, 0.8),
                signal(SignalSource::Option, OptionType::PE, 0.8),
            ],
            market_hours(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].option_type, Some(OptionType::CE));

        let mut o = SignalOrchestrator::default();
        let out = o.resolve(
            vec![
                signal(SignalSource::Option, OptionType::CE, 0.8),
                signal(SignalSource::Option, OptionType::PE, 0.8),
            ],
            market_hours(),
        );
        assert_eq!(out[0].option_type, Some(OptionType::CE));
    }

    #[test]
    fn cooldown_suppresses_followups() {
        let mut o = SignalOrchestrator::default();
        let first = o.resolve(
            vec![signal(SignalSource::Sensex, OptionType::CE, 0.8)],
            market_hours(),
        );
        assert_eq!(first.len(), 1);

        let soon = o.resolve(
            vec![signal(SignalSource::Sensex, OptionType::CE, 0.8)],
            market_hours() + Duration::minutes(9),
        );
        assert!(soon.is_empty());

        let later = o.resolve(
            vec![signal(SignalSource::Sensex, OptionType::CE, 0.8)],
            market_hours() + Duration::minutes(10),
        );
        assert_eq!(later.len(), 1);
    }

    #[test]
    fn low_confidence_is_dropped() {
        let mut o = SignalOrchestrator::default();
        let out = o.resolve(
            vec![signal(SignalSource::Option, OptionType::CE, 0.64)],
            market_hours(),
        );
        assert!(out.is_empty());
        assert!(o.last_signal_time().is_none());
    }

    #[test]
    fn summary_aggregates() {
        let signals = vec![
            signal(SignalSource::Sensex, OptionType::CE, 0.8),
            signal(SignalSource::Option, OptionType::PE, 0.6),
        ];
        let summary = SignalOrchestrator::summary(&signals);
        assert_eq!(summary.total_signals, 2);
        assert!((summary.avg_confidence - 0.7).abs() < 1e-9);
        assert!((summary.max_confidence - 0.8).abs() < 1e-9);
        assert_eq!(summary.sources, vec!["sensex", "option"]);
    }
}
