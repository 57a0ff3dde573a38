//! Handler for the `config` command group.

use std::fs;
use std::path::Path;

use crate::adapter::inbound::cli::check::load_with_diagnostic;
use crate::adapter::inbound::cli::command::ConfigCommand;
use crate::adapter::inbound::cli::output;
use crate::error::{ConfigError, Error, Result};
use crate::infrastructure::config::Config;

/// Default config template with documentation.
const CONFIG_TEMPLATE: &str = include_str!("../../../../config.toml.example");

pub fn execute(command: &ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Init(args) => execute_init(&args.path, args.force),
        ConfigCommand::Show(args) => execute_show(&args.config),
        ConfigCommand::Validate(args) => execute_validate(&args.config),
    }
}

/// Execute `config init`.
pub fn execute_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(ConfigError::InvalidValue {
            field: "config",
            reason: "file already exists (use --force to overwrite)".to_string(),
        }
        .into());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, CONFIG_TEMPLATE)?;
    output::section("Config Initialized");
    output::success("Created configuration file");
    output::field("Path", path.display());
    output::section("Next Steps");
    output::note(&format!("1. Edit {} with your settings", path.display()));
    output::note("2. Put ZAPI_KEY and ZAPI_SECRET in .env");
    output::note(&format!(
        "3. Run: sensexbot check config -c {}",
        path.display()
    ));
    output::note(&format!("4. Run: sensexbot run -c {}", path.display()));
    Ok(())
}

fn render_effective(config: &Config) -> Result<String> {
    toml::to_string_pretty(config)
        .map_err(|e| Error::Config(ConfigError::Other(format!("cannot render config: {e}"))))
}

/// Execute `config show`.
///
/// Prints the configuration after defaults and environment overrides.
/// Secrets are shown only as set or unset.
pub fn execute_show(path: &Path) -> Result<()> {
    let config = load_with_diagnostic(path)?;

    if output::is_json() {
        output::json_output(serde_json::json!({
            "command": "config.show",
            "config": serde_json::to_value(&config)?,
            "secrets": format!("{:?}", config.secrets),
        }));
        return Ok(());
    }

    output::section("Effective Configuration");
    output::field("Source", path.display());
    output::lines(&render_effective(&config)?);

    output::section("Secrets");
    output::lines(&format!("{:#?}", config.secrets));
    Ok(())
}

/// Execute `config validate`.
pub fn execute_validate(path: &Path) -> Result<()> {
    output::section("Config Validation");
    output::field("Path", path.display());
    let config = load_with_diagnostic(path)?;
    output::success("Config file is valid");

    let issues = config.credential_issues();
    if !issues.is_empty() {
        output::section("Warnings");
        for issue in &issues {
            output::warning(&format!("{}: {}", issue.field, issue.reason));
        }
    }

    output::field(
        "Next",
        format!("sensexbot config show -c {}", path.display()),
    );

    Ok(())
}
