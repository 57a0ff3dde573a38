//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe the broker, storage, credential persistence,
//! market data archive and notification dependencies of the application.

pub mod archive;
pub mod broker;
pub mod credential;
pub mod notifier;
pub mod store;
