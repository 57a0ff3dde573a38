use std::sync::Arc;

use chrono::Utc;

use crate::port::inbound::runtime::RuntimeState;

use super::super::command::{command_help, TelegramCommand};
use super::TelegramControl;

impl TelegramControl {
    #[must_use]
    pub fn new(state: Arc<dyn RuntimeState>) -> Self {
        Self {
            state,
            started_at: Utc::now(),
        }
    }

    /// Execute one parsed command and return response text.
    pub async fn execute(&self, command: TelegramCommand) -> String {
        match command {
            TelegramCommand::Start | TelegramCommand::Help => command_help().to_string(),
            TelegramCommand::Status => self.status_text(),
            TelegramCommand::Health => self.health_text(),
            TelegramCommand::Risk => self.risk_text(),
            TelegramCommand::Balance => self.balance_text().await,
            TelegramCommand::Token => self.token_text(),
            TelegramCommand::Login => self.login_text(),
            TelegramCommand::Mode => self.mode_text(),
            TelegramCommand::Pause => self.pause_text(),
            TelegramCommand::Resume => self.resume_text(),
            TelegramCommand::EmergencyStop => self.emergency_stop_text(),
            TelegramCommand::RiskReset => self.risk_reset_text(),
            TelegramCommand::SetRisk { kind, value } => self.set_risk_text(kind, value),
        }
    }
}
