//! The 3-minute trading cycle.

mod engine;

pub use engine::{CycleOutcome, EngineSettings, TradingEngine, CYCLE_INTERVAL};
