//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`auth`] - In-memory credential store and scripted session exchange.
//! - [`store`] - In-memory [`TradeStore`](crate::port::outbound::store::TradeStore).
//! - [`broker`] - Scripted [`Broker`](crate::port::outbound::broker::Broker) with
//!   canned prices and candles.
//! - [`domain`] - Builders for instants, candles and positions.
//! - [`runtime`] - Settable [`RuntimeState`](crate::port::inbound::runtime::RuntimeState)
//!   for control surfaces.

pub mod auth;
pub mod broker;
pub mod domain;
pub mod runtime;
pub mod store;
