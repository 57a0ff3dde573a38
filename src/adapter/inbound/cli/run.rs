//! Handlers for the `run` and `auth-server` commands.

use std::path::Path;

use tokio::sync::watch;
use tracing::info;

use crate::adapter::inbound::cli::command::ConfigPathArg;
use crate::adapter::inbound::cli::output;
use crate::error::Result;
use crate::infrastructure::config::Config;
use crate::infrastructure::runtime::{run_with_shutdown, serve_auth_with_shutdown};

/// Load the config and apply CLI verbosity to its logging section.
pub(crate) fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load_or_default(path)?;
    config.logging = config
        .logging
        .with_verbosity(output::verbosity(), output::is_quiet());
    if output::is_json() {
        config.logging.format = "json".to_string();
    }
    Ok(config)
}

/// Flip the shutdown channel on Ctrl+C.
fn spawn_ctrl_c(sender: watch::Sender<bool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, shutting down");
            let _ = sender.send(true);
        }
    });
}

fn print_startup(config: &Config, path: &Path) {
    if output::is_quiet() || output::is_json() {
        return;
    }
    output::header(env!("CARGO_PKG_VERSION"));
    output::field("Config", path.display());
    output::field("Mode", config.mode);
    output::field("Database", &config.database);
    output::field("Postback", config.auth.postback_url());
    if config.secrets.api_key.is_none() {
        output::warning("ZAPI_KEY not set, login server disabled");
    }
    if config.mode.is_live() {
        output::warning("Live mode: real orders will be placed");
    }
}

/// Execute the run command.
pub async fn execute(args: &ConfigPathArg) -> Result<()> {
    let config = load_config(&args.config)?;
    config.init_logging();
    print_startup(&config, &args.config);

    let (sender, receiver) = watch::channel(false);
    spawn_ctrl_c(sender);
    run_with_shutdown(config, receiver).await
}

/// Execute the auth-server command.
pub async fn execute_auth_server(args: &ConfigPathArg) -> Result<()> {
    let config = load_config(&args.config)?;
    config.init_logging();
    if !output::is_quiet() && !output::is_json() {
        output::header(env!("CARGO_PKG_VERSION"));
        output::field("Listening", config.auth.bind_address());
        output::field("Postback", config.auth.postback_url());
        output::hint(&format!(
            "open {}/auth/generate to create a login link",
            config.auth.base_url()
        ));
    }

    let (sender, receiver) = watch::channel(false);
    spawn_ctrl_c(sender);
    serve_auth_with_shutdown(config, receiver).await
}
