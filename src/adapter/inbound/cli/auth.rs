//! Handler for the `login` command.
//!
//! Asks the running login server for a fresh link so the pending session
//! lives in the process that will receive the postback.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adapter::inbound::cli::command::LoginArgs;
use crate::adapter::inbound::cli::output;
use crate::adapter::inbound::cli::run::load_config;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Serialize)]
struct GeneratedLogin {
    state: String,
    login_url: String,
    postback_url: String,
    expires_at: DateTime<Utc>,
}

fn generate_url(base_url: &str, state: Option<&str>) -> Result<url::Url> {
    let mut url = url::Url::parse(&format!("{base_url}/auth/generate"))?;
    if let Some(state) = state {
        url.query_pairs_mut().append_pair("state", state);
    }
    Ok(url)
}

/// Execute the login command.
pub async fn execute(args: &LoginArgs) -> Result<()> {
    let config = load_config(&args.config.config)?;
    let url = generate_url(&config.auth.base_url(), args.state.as_deref())?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let pb = output::spinner("Requesting login link...");
    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            output::spinner_fail(&pb, "Login server unreachable");
            output::hint("start it with `sensexbot run` or `sensexbot auth-server`");
            return Err(Error::Connection(format!("{url}: {e}")));
        }
    };
    if !response.status().is_success() {
        output::spinner_fail(&pb, "Login server refused the request");
        return Err(Error::Connection(format!(
            "{url} returned {}",
            response.status()
        )));
    }
    let login: GeneratedLogin = response.json().await?;
    output::spinner_success(&pb, "Login link created");

    if output::is_json() {
        output::json_output(serde_json::to_value(&login)?);
        return Ok(());
    }

    output::field("State", &login.state);
    output::field("Expires", login.expires_at.format("%H:%M:%S UTC"));
    output::field("Postback", &login.postback_url);
    output::section("Open this link to log in");
    output::lines(&login.login_url);
    Ok(())
}
