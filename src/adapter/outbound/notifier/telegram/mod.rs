//! Telegram notification and command handling.
//!
//! Pushes trade and auth events to one chat and answers operator commands
//! from that chat only.

mod auth;
mod command;
mod format;
mod throttle;

pub mod control;
pub mod notifier;

pub use notifier::{send_test_message, spawn_command_listener, TelegramConfig, TelegramNotifier};
