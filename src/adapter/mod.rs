//! Implementations of ports (hexagonal adapters).
//!
//! - [`inbound`]: CLI and the postback HTTP server
//! - [`outbound`]: Kite Connect, SQLite, the `.env` token file and Telegram

pub mod inbound;
pub mod outbound;
