//! Command-line interface definitions.
//!
//! Defines the CLI structure for the sensexbot application using `clap`.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use super::paths;

/// SENSEX weekly options bot for Zerodha Kite
#[derive(Parser, Debug)]
#[command(name = "sensexbot")]
#[command(version)]
pub struct Cli {
    /// Color output mode [auto, always, never]
    #[arg(
        long,
        global = true,
        default_value = "auto",
        hide_possible_values = true
    )]
    pub color: ColorChoice,

    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase output verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Color output mode for terminal rendering.
#[derive(Clone, Debug, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect automatically
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the trading loop, login server and Telegram control
    Run(ConfigPathArg),

    /// Serve only the Kite login endpoints
    AuthServer(ConfigPathArg),

    /// Request a fresh login URL from the running login server
    Login(LoginArgs),

    /// Show today's risk counters and session
    Status(DateArgs),

    /// Print the daily report for a date
    Report(DateArgs),

    /// Collect, list and replay archived market data
    #[command(subcommand)]
    Data(DataCommand),

    /// Run diagnostic checks
    #[command(subcommand)]
    Check(CheckCommand),

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Subcommands for `sensexbot check`.
#[derive(Subcommand, Debug)]
pub enum CheckCommand {
    /// Validate the configuration and the credentials the mode needs.
    Config(ConfigPathArg),
    /// Show the stored access token and optionally verify it with Kite.
    Token(TokenCheckArgs),
    /// Send a test message to the configured chat.
    Telegram(ConfigPathArg),
}

/// Subcommands for `sensexbot data`.
#[derive(Subcommand, Debug)]
pub enum DataCommand {
    /// Archive a day's SENSEX and option candles now.
    Collect(CollectArgs),
    /// List archived days, most recent first.
    List(DataListArgs),
    /// Run the strategy over an archived day with simulated fills.
    Replay(ReplayArgs),
    /// Move days past retention into the monthly archive.
    Cleanup(ConfigPathArg),
}

/// Subcommands for `sensexbot config`.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write a documented configuration file.
    Init(ConfigInitArgs),
    /// Display the effective configuration with defaults and overrides applied.
    Show(ConfigPathArg),
    /// Validate a configuration file.
    Validate(ConfigPathArg),
}

/// Shared argument struct for commands that require only a configuration path.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to the configuration file.
    #[arg(short, long, default_value_os_t = paths::default_config())]
    pub config: PathBuf,
}

#[derive(Parser, Debug)]
pub struct LoginArgs {
    #[command(flatten)]
    pub config: ConfigPathArg,

    /// Use this state instead of a random one.
    #[arg(long)]
    pub state: Option<String>,
}

/// Arguments for `status` and `report`.
#[derive(Parser, Debug)]
pub struct DateArgs {
    #[command(flatten)]
    pub config: ConfigPathArg,

    /// Trading date (YYYY-MM-DD), defaults to today in IST.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Override the database path from the configuration.
    #[arg(long)]
    pub db: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct CollectArgs {
    #[command(flatten)]
    pub config: ConfigPathArg,

    /// Trading date (YYYY-MM-DD), defaults to today in IST.
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Parser, Debug)]
pub struct DataListArgs {
    #[command(flatten)]
    pub config: ConfigPathArg,

    /// Maximum number of days to show.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Parser, Debug)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub config: ConfigPathArg,

    /// Archived trading date (YYYY-MM-DD).
    #[arg(long)]
    pub date: NaiveDate,
}

#[derive(Parser, Debug)]
pub struct TokenCheckArgs {
    #[command(flatten)]
    pub config: ConfigPathArg,

    /// Call the Kite margins endpoint with the token.
    #[arg(long)]
    pub verify: bool,
}

#[derive(Parser, Debug)]
pub struct ConfigInitArgs {
    /// Where to write the file.
    #[arg(default_value_os_t = paths::default_config())]
    pub path: PathBuf,

    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from(["sensexbot", "status", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn report_date_parses() {
        let cli = Cli::try_parse_from(["sensexbot", "report", "--date", "2025-01-06"]).unwrap();
        let Commands::Report(args) = cli.command else {
            panic!("expected report");
        };
        assert_eq!(args.date, NaiveDate::from_ymd_opt(2025, 1, 6));
        assert!(Cli::try_parse_from(["sensexbot", "report", "--date", "06/01/2025"]).is_err());
    }

    #[test]
    fn nested_check_commands() {
        let cli = Cli::try_parse_from(["sensexbot", "check", "token", "--verify", "-c", "x.toml"])
            .unwrap();
        let Commands::Check(CheckCommand::Token(args)) = cli.command else {
            panic!("expected check token");
        };
        assert!(args.verify);
        assert_eq!(args.config.config, PathBuf::from("x.toml"));
    }

    #[test]
    fn data_commands_parse() {
        let cli = Cli::try_parse_from(["sensexbot", "data", "replay", "--date", "2025-01-06"])
            .unwrap();
        let Commands::Data(DataCommand::Replay(args)) = cli.command else {
            panic!("expected data replay");
        };
        assert_eq!(Some(args.date), NaiveDate::from_ymd_opt(2025, 1, 6));
        assert!(Cli::try_parse_from(["sensexbot", "data", "replay"]).is_err());

        let cli = Cli::try_parse_from(["sensexbot", "data", "list"]).unwrap();
        let Commands::Data(DataCommand::List(args)) = cli.command else {
            panic!("expected data list");
        };
        assert_eq!(args.limit, 20);
    }

    #[test]
    fn auth_server_is_kebab_case() {
        assert!(Cli::try_parse_from(["sensexbot", "auth-server"]).is_ok());
    }
}
