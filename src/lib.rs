//! sensexbot - SENSEX weekly options trading for Zerodha Kite Connect.
//!
//! The bot watches 3-minute SENSEX and option candles, enters a single
//! option leg when the EMA conditions line up, and exits on stop loss,
//! profit target, candle count or end of day. Every entry passes the risk
//! manager first.
//!
//! # Architecture
//!
//! - [`domain`] - Candles, positions, sessions, signals and the IST market
//!   calendar. No I/O.
//! - [`port`] - Traits the application depends on (`Broker`, `TradeStore`,
//!   `CredentialStore`, `Notifier`) and the `RuntimeState` control surface.
//! - [`application`] - Risk manager, signal detectors, postback login flow
//!   and the trading cycle.
//! - [`adapter`] - Kite Connect, SQLite, Telegram, the postback server and
//!   the CLI.
//! - [`infrastructure`] - Configuration loading and runtime wiring.
//!
//! # Modes
//!
//! - `test` - synthetic candles and simulated fills
//! - `paper` - Kite market data and simulated fills
//! - `live` - real orders through Kite
//!
//! # Features
//!
//! - `telegram` (default) - notifications and chat commands
//! - `testkit` - in-memory ports and builders for integration tests

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
