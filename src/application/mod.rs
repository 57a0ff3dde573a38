//! Application services.
//!
//! - [`state`]: shared limits, counters and halt flag
//! - [`risk`]: entry gating and daily bookkeeping
//! - [`signal`]: EMA detectors and conflict resolution
//! - [`auth`]: postback login flow
//! - [`trading`]: the 3-minute cycle
//! - [`data`]: end-of-day candle collection and replay
//! - [`runtime`]: operator control surface

pub mod auth;
pub mod data;
pub mod risk;
pub mod runtime;
pub mod signal;
pub mod state;
pub mod trading;
