//! Telegram notification and command handling.
//!
//! Provides the [`TelegramNotifier`] for sending trade notifications and
//! [`spawn_command_listener`] for handling bot commands. Both run as
//! background tasks.
//!
//! Requires the `telegram` feature to be enabled.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use teloxide::prelude::*;
use teloxide::types::{BotCommand, ParseMode};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::auth::mask_secret;
use crate::port::inbound::runtime::RuntimeState;
use crate::port::outbound::notifier::{Event, Notifier};

use super::auth::command_response_for_message;
use super::command::bot_commands;
use super::control::TelegramControl;
use super::format::format_event_message;
use super::throttle::{Admission, MessageThrottle};

/// Configuration for the Telegram notifier.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot API token obtained from BotFather.
    pub bot_token: String,
    /// Target chat ID for notifications and the only chat answered.
    pub chat_id: i64,
    /// Send a message for every detected signal (noisy).
    pub notify_signals: bool,
    pub notify_risk_rejections: bool,
    /// Identical consecutive messages inside this window are dropped.
    pub dedup_window: Duration,
    pub max_messages_per_minute: usize,
}

impl TelegramConfig {
    #[must_use]
    pub fn new(bot_token: String, chat_id: i64) -> Self {
        Self {
            bot_token,
            chat_id,
            notify_signals: false,
            notify_risk_rejections: true,
            dedup_window: Duration::from_secs(60),
            max_messages_per_minute: 20,
        }
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &mask_secret(&self.bot_token))
            .field("chat_id", &self.chat_id)
            .field("notify_signals", &self.notify_signals)
            .field("notify_risk_rejections", &self.notify_risk_rejections)
            .field("dedup_window", &self.dedup_window)
            .field("max_messages_per_minute", &self.max_messages_per_minute)
            .finish()
    }
}

/// Telegram notifier that sends messages to a chat.
///
/// Implements the [`Notifier`] trait. Delivery happens on a background
/// task, so this must be constructed inside a Tokio runtime.
pub struct TelegramNotifier {
    sender: mpsc::UnboundedSender<Event>,
}

impl TelegramNotifier {
    /// Spawn the delivery worker.
    #[must_use]
    pub fn new(config: TelegramConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(telegram_worker(config, receiver));
        Self { sender }
    }
}

/// Answer bot commands from the configured chat against `state`.
pub fn spawn_command_listener(config: TelegramConfig, state: Arc<dyn RuntimeState>) -> JoinHandle<()> {
    tokio::spawn(telegram_command_worker(config, TelegramControl::new(state)))
}

/// Send one plain-text message and wait for Telegram to accept it.
///
/// # Errors
///
/// Returns the Bot API error when the token or chat is wrong.
pub async fn send_test_message(config: &TelegramConfig, text: &str) -> Result<(), teloxide::RequestError> {
    let bot = Bot::new(&config.bot_token);
    bot.send_message(ChatId(config.chat_id), text).await?;
    Ok(())
}

impl Notifier for TelegramNotifier {
    fn notify(&self, event: Event) {
        if self.sender.send(event).is_err() {
            warn!("Telegram notifier channel closed");
        }
    }
}

/// Background worker that sends Telegram messages.
async fn telegram_worker(config: TelegramConfig, mut receiver: mpsc::UnboundedReceiver<Event>) {
    let bot = Bot::new(&config.bot_token);
    let chat_id = ChatId(config.chat_id);
    let mut throttle = MessageThrottle::new(config.dedup_window, config.max_messages_per_minute);

    info!(
        chat_id = config.chat_id,
        token = %mask_secret(&config.bot_token),
        "Telegram notifier started"
    );

    while let Some(event) = receiver.recv().await {
        let Some(text) = format_event_message(&event, &config) else {
            continue;
        };

        match throttle.admit(&text, Instant::now()) {
            Admission::Send => {}
            Admission::Duplicate => {
                debug!("Dropping duplicate Telegram message");
                continue;
            }
            Admission::RateLimited => {
                warn!(
                    limit = config.max_messages_per_minute,
                    "Telegram rate limit reached, dropping message"
                );
                continue;
            }
        }

        if let Err(e) = bot
            .send_message(chat_id, &text)
            .parse_mode(ParseMode::MarkdownV2)
            .await
        {
            error!(error = %e, "Failed to send Telegram message");
        }
    }

    warn!("Telegram notifier worker shutting down");
}

/// Background worker that handles inbound Telegram commands.
async fn telegram_command_worker(config: TelegramConfig, control: TelegramControl) {
    let bot = Bot::new(&config.bot_token);
    let allowed_chat = ChatId(config.chat_id);

    if let Err(e) = register_bot_commands(&bot).await {
        warn!(error = %e, "Failed to register bot commands with Telegram");
    }

    info!(
        chat_id = config.chat_id,
        "Telegram command listener started"
    );

    teloxide::repl(bot, move |bot: Bot, msg: Message| {
        let control = control.clone();
        async move {
            let Some(text) = msg.text() else {
                return respond(());
            };

            if let Some(response) =
                command_response_for_message(text, msg.chat.id, allowed_chat, &control).await
            {
                if let Err(e) = bot.send_message(msg.chat.id, response).await {
                    error!(error = %e, "Failed to send Telegram command response");
                }
            }

            respond(())
        }
    })
    .await;
}

/// Register bot commands with Telegram for the "/" menu.
async fn register_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    let commands: Vec<BotCommand> = bot_commands()
        .into_iter()
        .map(|(cmd, desc)| BotCommand::new(cmd, desc))
        .collect();

    bot.set_my_commands(commands).await?;
    info!("Registered bot commands with Telegram");
    Ok(())
}
