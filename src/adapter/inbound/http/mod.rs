//! Postback HTTP server.
//!
//! Serves the Kite redirect target, login link generation, and small JSON
//! status endpoints for the operator.

mod error;
mod handler;
mod page;
mod server;

pub use error::ApiError;
pub use server::{router, serve, spawn_cleanup, ServerState};
