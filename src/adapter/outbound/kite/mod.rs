//! Zerodha Kite Connect adapter.
//!
//! - [`KiteClient`]: REST client for market data, orders and session exchange
//! - [`PaperBroker`]: simulated fills over real or synthetic data

mod client;
mod dto;
mod paper;

pub use client::{session_checksum, KiteClient, KiteConfig, KITE_API_URL};
pub use paper::{synthetic_candles, PaperBroker};
