//! Telegram command execution against runtime state.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::port::inbound::runtime::RuntimeState;

mod dispatch;
mod mutate;
mod render;

/// Runtime command executor for Telegram control commands.
#[derive(Clone)]
pub struct TelegramControl {
    state: Arc<dyn RuntimeState>,
    started_at: DateTime<Utc>,
}

fn format_uptime(started_at: DateTime<Utc>) -> String {
    let total_seconds = (Utc::now() - started_at).num_seconds().max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests;
