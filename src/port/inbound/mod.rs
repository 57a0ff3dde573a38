//! Inbound (driving) ports consumed by inbound adapters.
//!
//! - [`risk`]: risk check result types for trade validation
//! - [`runtime`]: runtime state and control interface for the Telegram bot

pub mod risk;
pub mod runtime;
