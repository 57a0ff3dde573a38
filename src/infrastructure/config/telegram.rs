//! Telegram notification configuration.

use serde::{Deserialize, Serialize};

use super::secrets::Secrets;

const fn default_true() -> bool {
    true
}

/// `[telegram]` section. The token and chat id come from the environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramAppConfig {
    /// Enable telegram notifications.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Send a message for every detected signal (noisy).
    #[serde(default)]
    pub notify_signals: bool,
    /// Send risk rejection alerts.
    #[serde(default = "default_true")]
    pub notify_risk_rejections: bool,
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
    #[serde(default = "default_max_messages_per_minute")]
    pub max_messages_per_minute: usize,
}

const fn default_dedup_window_secs() -> u64 {
    60
}

const fn default_max_messages_per_minute() -> usize {
    20
}

impl Default for TelegramAppConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            notify_signals: false,
            notify_risk_rejections: default_true(),
            dedup_window_secs: default_dedup_window_secs(),
            max_messages_per_minute: default_max_messages_per_minute(),
        }
    }
}

#[cfg(feature = "telegram")]
impl TelegramAppConfig {
    /// Notifier settings, or `None` when disabled or credentials are missing.
    #[must_use]
    pub fn notifier_config(
        &self,
        secrets: &Secrets,
    ) -> Option<crate::adapter::outbound::notifier::telegram::TelegramConfig> {
        if !self.enabled {
            return None;
        }
        let token = secrets.telegram_token.clone()?;
        let chat_id = secrets.telegram_chat_id?;
        let mut config =
            crate::adapter::outbound::notifier::telegram::TelegramConfig::new(token, chat_id);
        config.notify_signals = self.notify_signals;
        config.notify_risk_rejections = self.notify_risk_rejections;
        config.dedup_window = std::time::Duration::from_secs(self.dedup_window_secs);
        config.max_messages_per_minute = self.max_messages_per_minute;
        Some(config)
    }
}
