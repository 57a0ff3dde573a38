//! Telegram command parsing.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::port::inbound::runtime::RuntimeRiskLimitKind;

/// Supported Telegram commands.
#[derive(Debug, Clone, PartialEq)]
pub enum TelegramCommand {
    Start,
    Help,
    Status,
    Health,
    Risk,
    Balance,
    Token,
    Login,
    Pause,
    Resume,
    EmergencyStop,
    RiskReset,
    Mode,
    SetRisk {
        kind: RuntimeRiskLimitKind,
        value: Decimal,
    },
}

/// Parse error for Telegram command messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    NotACommand,
    UnknownCommand(String),
    MissingArgument(&'static str),
    InvalidRiskField(String),
    InvalidDecimal(String),
}

impl std::fmt::Display for CommandParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotACommand => write!(f, "message is not a command"),
            Self::UnknownCommand(cmd) => write!(f, "unknown command `{cmd}`"),
            Self::MissingArgument(name) => write!(f, "missing argument `{name}`"),
            Self::InvalidRiskField(field) => write!(
                f,
                "invalid risk field `{field}` (use: max_trades, max_losses, max_loss, max_exposure, lot_size)"
            ),
            Self::InvalidDecimal(value) => write!(f, "invalid decimal value `{value}`"),
        }
    }
}

impl std::error::Error for CommandParseError {}

/// Parse a Telegram message into a bot command.
pub fn parse_command(text: &str) -> Result<TelegramCommand, CommandParseError> {
    let mut parts = text.split_whitespace();
    let Some(raw_command) = parts.next() else {
        return Err(CommandParseError::NotACommand);
    };
    if !raw_command.starts_with('/') {
        return Err(CommandParseError::NotACommand);
    }

    let command = raw_command
        .split_once('@')
        .map_or(raw_command, |(head, _)| head);

    match command {
        "/start" => Ok(TelegramCommand::Start),
        "/help" => Ok(TelegramCommand::Help),
        "/status" => Ok(TelegramCommand::Status),
        "/health" => Ok(TelegramCommand::Health),
        "/risk" => Ok(TelegramCommand::Risk),
        "/balance" => Ok(TelegramCommand::Balance),
        "/token" => Ok(TelegramCommand::Token),
        "/login" => Ok(TelegramCommand::Login),
        "/pause" | "/stop" => Ok(TelegramCommand::Pause),
        "/resume" => Ok(TelegramCommand::Resume),
        "/emergency_stop" => Ok(TelegramCommand::EmergencyStop),
        "/risk_reset" => Ok(TelegramCommand::RiskReset),
        "/mode" => Ok(TelegramCommand::Mode),
        "/set_risk" => {
            let raw_field = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("field"))?;
            let raw_value = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("value"))?;

            let kind = parse_risk_limit_kind(raw_field)?;
            let value = Decimal::from_str(raw_value)
                .map_err(|_| CommandParseError::InvalidDecimal(raw_value.to_string()))?;

            Ok(TelegramCommand::SetRisk { kind, value })
        }
        other => Err(CommandParseError::UnknownCommand(other.to_string())),
    }
}

fn parse_risk_limit_kind(value: &str) -> Result<RuntimeRiskLimitKind, CommandParseError> {
    match value {
        "max_trades" | "max_daily_trades" => Ok(RuntimeRiskLimitKind::MaxTrades),
        "max_losses" | "max_consecutive_losses" => Ok(RuntimeRiskLimitKind::MaxLosses),
        "max_loss" | "max_daily_loss" => Ok(RuntimeRiskLimitKind::MaxLoss),
        "max_exposure" => Ok(RuntimeRiskLimitKind::MaxExposure),
        "lot_size" => Ok(RuntimeRiskLimitKind::LotSize),
        _ => Err(CommandParseError::InvalidRiskField(value.to_string())),
    }
}

/// Help text returned by `/start` and `/help`.
#[must_use]
pub const fn command_help() -> &'static str {
    "📋 Commands\n\n\
    /status - 📊 Trading status\n\
    /health - 🏥 System health check\n\
    /risk - 🛡️ Risk counters and limits\n\
    /balance - 💰 Available balance\n\
    /token - 🔑 Access token status\n\
    /login - 🔐 New Kite login link\n\
    /mode - 🧭 Trading mode\n\
    /pause - ⏸️ Halt new entries (alias /stop)\n\
    /resume - ▶️ Resume trading\n\
    /emergency_stop - 🚨 Halt and raise an alert\n\
    /risk_reset - 🔄 Reset daily counters\n\
    /set_risk <field> <value> - ⚙️ Update risk limit\n\n\
    Risk fields: max_trades, max_losses, max_loss, max_exposure, lot_size"
}

/// Bot commands for Telegram menu registration.
///
/// Returns tuples of (command, description) for `set_my_commands`.
#[must_use]
pub fn bot_commands() -> Vec<(&'static str, &'static str)> {
    vec![
        ("status", "Trading status"),
        ("health", "System health check"),
        ("risk", "Risk counters and limits"),
        ("balance", "Available balance"),
        ("token", "Access token status"),
        ("login", "New Kite login link"),
        ("mode", "Trading mode"),
        ("pause", "Halt new entries"),
        ("resume", "Resume trading"),
        ("emergency_stop", "Halt and raise an alert"),
        ("risk_reset", "Reset daily counters"),
        ("set_risk", "Update risk limit"),
        ("help", "Show all commands"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parse_all_basic_commands() {
        assert_eq!(parse_command("/start").unwrap(), TelegramCommand::Start);
        assert_eq!(parse_command("/help").unwrap(), TelegramCommand::Help);
        assert_eq!(parse_command("/status").unwrap(), TelegramCommand::Status);
        assert_eq!(parse_command("/health").unwrap(), TelegramCommand::Health);
        assert_eq!(parse_command("/risk").unwrap(), TelegramCommand::Risk);
        assert_eq!(parse_command("/balance").unwrap(), TelegramCommand::Balance);
        assert_eq!(parse_command("/token").unwrap(), TelegramCommand::Token);
        assert_eq!(parse_command("/login").unwrap(), TelegramCommand::Login);
        assert_eq!(parse_command("/mode").unwrap(), TelegramCommand::Mode);
        assert_eq!(parse_command("/resume").unwrap(), TelegramCommand::Resume);
        assert_eq!(
            parse_command("/emergency_stop").unwrap(),
            TelegramCommand::EmergencyStop
        );
        assert_eq!(
            parse_command("/risk_reset").unwrap(),
            TelegramCommand::RiskReset
        );
    }

    #[test]
    fn stop_is_an_alias_for_pause() {
        assert_eq!(parse_command("/pause").unwrap(), TelegramCommand::Pause);
        assert_eq!(parse_command("/stop").unwrap(), TelegramCommand::Pause);
    }

    #[test]
    fn parse_command_with_bot_mention() {
        assert_eq!(
            parse_command("/status@sensex_bot").unwrap(),
            TelegramCommand::Status
        );
        assert_eq!(parse_command("/stop@BOT").unwrap(), TelegramCommand::Pause);
    }

    #[test]
    fn parse_set_risk_fields_and_aliases() {
        assert_eq!(
            parse_command("/set_risk max_trades 5").unwrap(),
            TelegramCommand::SetRisk {
                kind: RuntimeRiskLimitKind::MaxTrades,
                value: dec!(5),
            }
        );
        assert_eq!(
            parse_command("/set_risk max_consecutive_losses 3").unwrap(),
            TelegramCommand::SetRisk {
                kind: RuntimeRiskLimitKind::MaxLosses,
                value: dec!(3),
            }
        );
        assert_eq!(
            parse_command("/set_risk max_loss -2500.50").unwrap(),
            TelegramCommand::SetRisk {
                kind: RuntimeRiskLimitKind::MaxLoss,
                value: dec!(-2500.50),
            }
        );
        assert_eq!(
            parse_command("/set_risk lot_size 40").unwrap(),
            TelegramCommand::SetRisk {
                kind: RuntimeRiskLimitKind::LotSize,
                value: dec!(40),
            }
        );
    }

    #[test]
    fn set_risk_argument_errors() {
        assert_eq!(
            parse_command("/set_risk").unwrap_err(),
            CommandParseError::MissingArgument("field")
        );
        assert_eq!(
            parse_command("/set_risk max_trades").unwrap_err(),
            CommandParseError::MissingArgument("value")
        );
        assert_eq!(
            parse_command("/set_risk min_profit 1").unwrap_err(),
            CommandParseError::InvalidRiskField("min_profit".to_string())
        );
        assert_eq!(
            parse_command("/set_risk max_trades five").unwrap_err(),
            CommandParseError::InvalidDecimal("five".to_string())
        );
    }

    #[test]
    fn non_commands_and_unknown_commands() {
        assert_eq!(
            parse_command("hello").unwrap_err(),
            CommandParseError::NotACommand
        );
        assert_eq!(parse_command("").unwrap_err(), CommandParseError::NotACommand);
        assert_eq!(
            parse_command("/positions").unwrap_err(),
            CommandParseError::UnknownCommand("/positions".to_string())
        );
        // Case sensitive.
        assert!(matches!(
            parse_command("/STATUS"),
            Err(CommandParseError::UnknownCommand(_))
        ));
    }

    #[test]
    fn error_messages_name_the_problem() {
        assert!(CommandParseError::UnknownCommand("/x".into())
            .to_string()
            .contains("unknown command"));
        assert!(CommandParseError::MissingArgument("field")
            .to_string()
            .contains("missing argument"));
        assert!(CommandParseError::InvalidRiskField("x".into())
            .to_string()
            .contains("invalid risk field"));
        assert!(CommandParseError::InvalidDecimal("x".into())
            .to_string()
            .contains("invalid decimal"));
    }

    #[test]
    fn every_menu_command_parses_and_is_in_help() {
        let help = command_help();
        assert!(help.contains("Commands"));
        for (name, _) in bot_commands() {
            let text = if name == "set_risk" {
                "/set_risk max_trades 1".to_string()
            } else {
                format!("/{name}")
            };
            assert!(parse_command(&text).is_ok(), "{name} should parse");
            assert!(help.contains(&format!("/{name}")), "{name} missing from help");
        }
    }
}
