//! Outbound notification backends.
//!
//! Telegram is the only backend; builds without the `telegram` feature log
//! events and send nothing.

#[cfg(feature = "telegram")]
pub mod telegram;
