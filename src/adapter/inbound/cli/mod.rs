//! CLI module graph.

pub mod auth;
pub mod check;
pub mod command;
pub mod config;
pub mod data;
pub mod diagnostic;
pub mod output;
pub mod paths;
pub mod report;
pub mod run;
pub mod status;

use command::{Cli, ColorChoice, Commands};

use crate::error::Result;

/// Apply the global flags that shape terminal output.
pub fn configure(cli: &Cli) {
    output::configure(output::OutputConfig::new(cli.json, cli.quiet, cli.verbose));
    match cli.color {
        ColorChoice::Auto => owo_colors::unset_override(),
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
    }
}

/// Run the parsed command to completion.
pub async fn execute(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Run(args) => run::execute(args).await,
        Commands::AuthServer(args) => run::execute_auth_server(args).await,
        Commands::Login(args) => auth::execute(args).await,
        Commands::Status(args) => status::execute(args).await,
        Commands::Report(args) => report::execute(args).await,
        Commands::Data(command) => data::execute(command).await,
        Commands::Check(command) => check::execute(command).await,
        Commands::Config(command) => config::execute(command),
    }
}
