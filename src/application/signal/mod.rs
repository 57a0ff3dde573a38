//! Signal detection on SENSEX and option candles.
//!
//! Two detectors share the same EMA rule set; the orchestrator filters
//! their output by confidence, applies a cooldown and resolves CE/PE
//! conflicts.

pub mod option;
pub mod orchestrator;
pub mod sensex;

use serde::{Deserialize, Serialize};

use crate::domain::{EmaSnapshot, SignalCondition};

pub use option::{ExitCheck, OptionSignalDetector};
pub use orchestrator::{OptionLeg, SignalOrchestrator, SignalSummary};
pub use sensex::SensexSignalDetector;

/// Thresholds for both detectors and the orchestrator.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SignalConfig {
    pub ema_fast: usize,
    pub ema_slow: usize,
    /// Upper bound on `|ema_fast - ema_slow|`.
    pub ema_gap_threshold: f64,
    /// Upper bound on the distance from open or low to the fast EMA.
    pub proximity_threshold: f64,
    pub volume_threshold: f64,
    pub min_premium: f64,
    pub max_premium: f64,
    /// Confidence when every condition passes.
    pub confidence_base: f64,
    pub time_exit_candles: u32,
    /// Gain in percent that closes a position.
    pub profit_target_pct: f64,
    pub min_confidence: f64,
    pub cooldown_minutes: i64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            ema_fast: 10,
            ema_slow: 20,
            ema_gap_threshold: 15.0,
            proximity_threshold: 21.0,
            volume_threshold: 0.0,
            min_premium: 5.0,
            max_premium: 1000.0,
            confidence_base: 0.8,
            time_exit_candles: 10,
            profit_target_pct: 20.0,
            min_confidence: 0.8,
            cooldown_minutes: 10,
        }
    }
}

/// The four EMA rules common to both detectors.
pub(crate) fn ema_conditions(snapshot: &EmaSnapshot, config: &SignalConfig) -> Vec<SignalCondition> {
    let c = &snapshot.candle;
    let gap = (snapshot.fast - snapshot.slow).abs();
    let touch = (c.open - snapshot.fast).abs().min((c.low - snapshot.fast).abs());
    vec![
        SignalCondition::new(
            "green",
            c.is_green(),
            c.close - c.open,
            0.0,
            "close above open",
        ),
        SignalCondition::new(
            "ema_cross",
            snapshot.fast > snapshot.slow,
            snapshot.fast - snapshot.slow,
            0.0,
            format!("EMA{} above EMA{}", config.ema_fast, config.ema_slow),
        ),
        SignalCondition::new(
            "ema_gap",
            gap < config.ema_gap_threshold,
            gap,
            config.ema_gap_threshold,
            "EMAs converging",
        ),
        SignalCondition::new(
            "ema_touch",
            touch < config.proximity_threshold,
            touch,
            config.proximity_threshold,
            format!("open or low near EMA{}", config.ema_fast),
        ),
    ]
}

/// `passed / total * base`, and whether every condition passed.
pub(crate) fn score(conditions: &[SignalCondition], base: f64) -> (f64, bool) {
    if conditions.is_empty() {
        return (0.0, false);
    }
    let passed = conditions.iter().filter(|c| c.passed).count();
    let confidence = passed as f64 / conditions.len() as f64 * base;
    (confidence, passed == conditions.len())
}
