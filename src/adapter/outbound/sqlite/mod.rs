//! SQLite persistence adapter.
//!
//! Implements [`TradeStore`](crate::port::outbound::store::TradeStore) over
//! Diesel with an r2d2 pool.

pub mod database;
pub mod store;

pub use store::SqliteStore;
