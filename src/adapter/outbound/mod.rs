//! Outbound adapters (driven side).

pub mod archive;
pub mod credential;
pub mod kite;
pub mod notifier;
pub mod sqlite;
