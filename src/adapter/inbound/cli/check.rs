//! Handlers for the `check` subcommands.

use std::path::Path;

use chrono::Utc;
use serde_json::json;

use crate::adapter::inbound::cli::command::{CheckCommand, ConfigPathArg, TokenCheckArgs};
use crate::adapter::inbound::cli::diagnostic::ConfigDiagnostic;
use crate::adapter::inbound::cli::output;
use crate::adapter::inbound::cli::run::load_config;
use crate::application::auth::token_view;
use crate::error::{ConfigError, Error, Result};
use crate::infrastructure::bootstrap::{build_credentials, build_kite};
use crate::infrastructure::config::Config;
use crate::port::outbound::broker::Broker;

pub async fn execute(command: &CheckCommand) -> Result<()> {
    match command {
        CheckCommand::Config(args) => execute_config(&args.config),
        CheckCommand::Token(args) => execute_token(args).await,
        CheckCommand::Telegram(args) => execute_telegram(args).await,
    }
}

/// Load `path`, rendering a source-annotated diagnostic when it is rejected.
pub(crate) fn load_with_diagnostic(path: &Path) -> Result<Config> {
    match load_config(path) {
        Ok(config) => Ok(config),
        Err(e) => {
            if path.exists() && !output::is_json() {
                let content = std::fs::read_to_string(path).unwrap_or_default();
                let diagnostic =
                    ConfigDiagnostic::from_error(&path.display().to_string(), &content, &e);
                eprintln!("{:?}", miette::Report::new(diagnostic));
            }
            Err(e)
        }
    }
}

/// Validate configuration and the credentials the mode needs.
pub fn execute_config(path: &Path) -> Result<()> {
    let config = load_with_diagnostic(path)?;
    let issues = config.credential_issues();

    if output::is_json() {
        let problems: Vec<_> = issues
            .iter()
            .map(|i| json!({ "field": i.field, "reason": i.reason }))
            .collect();
        output::json_output(json!({
            "command": "check.config",
            "mode": config.mode,
            "valid": issues.is_empty(),
            "issues": problems,
        }));
    } else {
        output::section("Configuration Check");
        output::field("Config", path.display());
        output::field("Mode", config.mode);
        output::success("Configuration file is valid");

        output::section("Credentials");
        let secrets = &config.secrets;
        for (name, present) in [
            ("ZAPI_KEY", secrets.api_key.is_some()),
            ("ZAPI_SECRET", secrets.api_secret.is_some()),
            ("ACCESS_TOKEN", secrets.access_token.is_some()),
            ("TELEGRAM_TOKEN", secrets.telegram_token.is_some()),
            ("TELEGRAM_CHAT_ID", secrets.telegram_chat_id.is_some()),
        ] {
            output::field(
                name,
                if present {
                    output::positive("set")
                } else {
                    output::muted("not set")
                },
            );
        }
        for issue in &issues {
            output::warning(&format!("{}: {}", issue.field, issue.reason));
        }
    }

    match issues.into_iter().next() {
        Some(issue) => Err(ConfigError::from(issue).into()),
        None => Ok(()),
    }
}

/// Show the stored token and optionally call Kite with it.
pub async fn execute_token(args: &TokenCheckArgs) -> Result<()> {
    let config = load_config(&args.config.config)?;
    let credentials = build_credentials(&config);
    let view = token_view(credentials.as_ref(), Utc::now());

    if output::is_json() && !args.verify {
        output::json_output(json!({ "command": "check.token", "token": view }));
        return Ok(());
    }

    output::section("Access Token");
    output::field("Env file", &config.env_file);
    match &view.preview {
        Some(preview) => output::field("Token", preview),
        None => output::field("Token", output::muted("none")),
    }
    if let Some(issued) = view.issued_at {
        output::field("Issued", issued);
    }
    if let Some(expires) = view.expires_at {
        output::field("Expires", expires);
    }
    if view.valid {
        output::success("Token is within its validity window");
    } else if view.present {
        output::warning("Token has expired, log in again");
    } else {
        output::warning("No access token stored");
    }

    if !args.verify {
        return Ok(());
    }
    let Some(kite) = build_kite(&config, credentials.as_ref())? else {
        return Err(ConfigError::MissingField { field: "ZAPI_KEY" }.into());
    };
    let pb = output::spinner("Calling Kite...");
    match kite.available_balance().await {
        Ok(balance) => {
            output::spinner_success(&pb, "Kite accepted the token");
            output::field("Balance", output::rupees(balance));
            if output::is_json() {
                output::json_output(json!({
                    "command": "check.token",
                    "token": view,
                    "verified": true,
                }));
            }
            Ok(())
        }
        Err(e) => {
            output::spinner_fail(&pb, "Kite rejected the token");
            Err(e)
        }
    }
}

#[cfg(feature = "telegram")]
async fn execute_telegram(args: &ConfigPathArg) -> Result<()> {
    use crate::adapter::outbound::notifier::telegram::send_test_message;

    let config = load_config(&args.config)?;
    let Some(tg_config) = config.telegram.notifier_config(&config.secrets) else {
        output::error("Telegram is disabled or TELEGRAM_TOKEN / TELEGRAM_CHAT_ID is not set");
        return Err(ConfigError::MissingField {
            field: "TELEGRAM_TOKEN",
        }
        .into());
    };
    output::field("Chat", tg_config.chat_id);

    let pb = output::spinner("Sending test message...");
    let text = format!("sensexbot {} test message ({})", env!("CARGO_PKG_VERSION"), config.mode);
    match send_test_message(&tg_config, &text).await {
        Ok(()) => {
            output::spinner_success(&pb, "Message delivered");
            Ok(())
        }
        Err(e) => {
            output::spinner_fail(&pb, "Telegram rejected the message");
            Err(Error::Connection(format!("telegram: {e}")))
        }
    }
}

#[cfg(not(feature = "telegram"))]
async fn execute_telegram(_args: &ConfigPathArg) -> Result<()> {
    output::error("Built without the `telegram` feature");
    Err(ConfigError::Other("telegram support not compiled in".to_string()).into())
}
