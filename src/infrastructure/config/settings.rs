//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all application settings.
//! Configuration is loaded from a TOML file, then a fixed set of environment
//! variables override it. Credentials are only ever read from the environment.
//!
//! # Example
//!
//! ```no_run
//! use sensexbot::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::auth::AuthAppConfig;
use super::data::DataConfig;
use super::kite::KiteAppConfig;
use super::logging::LoggingConfig;
use super::market::MarketConfig;
use super::risk::RiskConfig;
use super::secrets::Secrets;
use super::strategy::StrategyConfig;
use super::telegram::TelegramAppConfig;
use crate::application::risk::{validate, validate_limits, CredentialPresence, RiskIssue};
use crate::application::state::RiskLimits;
use crate::domain::TradingMode;
use crate::error::{ConfigError, Result};

/// Main application configuration.
///
/// Load from a TOML file using [`Config::load`] or parse directly with
/// [`Config::parse_toml`]. Every section is optional.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// `test`, `paper` or `live`.
    pub mode: TradingMode,

    /// Path to the SQLite database file.
    pub database: String,

    /// `.env` file the access token is written back to after login.
    pub env_file: String,

    /// Directory for archived tokens.
    pub auth_data_dir: String,

    pub logging: LoggingConfig,
    pub kite: KiteAppConfig,
    pub auth: AuthAppConfig,
    pub risk: RiskConfig,
    pub strategy: StrategyConfig,
    pub telegram: TelegramAppConfig,
    pub market: MarketConfig,
    pub data: DataConfig,

    /// Populated from the environment, never from the file.
    #[serde(skip)]
    pub secrets: Secrets,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: TradingMode::default(),
            logging: LoggingConfig::default(),
            database: "sensexbot.db".into(),
            env_file: ".env".into(),
            auth_data_dir: "auth_data".into(),
            kite: KiteAppConfig::default(),
            auth: AuthAppConfig::default(),
            risk: RiskConfig::default(),
            strategy: StrategyConfig::default(),
            telegram: TelegramAppConfig::default(),
            market: MarketConfig::default(),
            data: DataConfig::default(),
            secrets: Secrets::default(),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

fn parse_env<T: FromStr>(field: &'static str, raw: &str) -> std::result::Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| invalid(field, format!("`{raw}`: {e}")))
}

fn parse_bool(field: &'static str, raw: &str) -> std::result::Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(field, format!("`{raw}` is not a boolean"))),
    }
}

impl From<RiskIssue> for ConfigError {
    fn from(issue: RiskIssue) -> Self {
        invalid(issue.field, issue.reason)
    }
}

impl Config {
    /// Parse configuration from TOML content and the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed, an environment override
    /// does not parse, or validation fails.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        Self::parse_toml_with(content, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::parse_toml`] with an explicit variable lookup.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml_with(content: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.apply_env(&lookup)?;
        config.secrets = Secrets::from_lookup(&lookup);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or [`Config::parse_toml`] fails.
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Load the file if it exists, otherwise start from defaults.
    #[allow(clippy::result_large_err)]
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            Self::parse_toml("")
        }
    }

    /// Environment overrides for deployments driven by a `.env` file.
    ///
    /// `DAILY_LOSS_CAP` is a positive rupee amount and becomes the negative
    /// `risk.max_daily_loss`.
    fn apply_env(
        &mut self,
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> std::result::Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get("MODE") {
            self.mode = raw
                .parse()
                .map_err(|_| invalid("MODE", format!("`{raw}` is not test, paper or live")))?;
        }
        if let Some(raw) = get("POSTBACK_HOST") {
            self.auth.postback_host = raw.trim().to_string();
        }
        if let Some(raw) = get("POSTBACK_PORT") {
            self.auth.postback_port = parse_env("POSTBACK_PORT", &raw)?;
        }
        if let Some(raw) = get("USE_HTTPS") {
            self.auth.use_https = parse_bool("USE_HTTPS", &raw)?;
        }
        if let Some(raw) = get("AUTH_TIMEOUT") {
            self.auth.timeout_secs = parse_env("AUTH_TIMEOUT", &raw)?;
        }
        if let Some(raw) = get("MAX_DAILY_TRADES") {
            self.risk.max_daily_trades = parse_env("MAX_DAILY_TRADES", &raw)?;
        }
        if let Some(raw) = get("DAILY_LOSS_CAP") {
            let cap: Decimal = parse_env("DAILY_LOSS_CAP", &raw)?;
            self.risk.max_daily_loss = -cap.abs();
        }
        if let Some(raw) = get("CONSECUTIVE_LOSS_LIMIT") {
            self.risk.max_consecutive_losses = parse_env("CONSECUTIVE_LOSS_LIMIT", &raw)?;
        }
        if let Some(raw) = get("LOT_SIZE") {
            self.risk.min_lot_size = parse_env("LOT_SIZE", &raw)?;
        }
        if let Some(raw) = get("MARKET_HOLIDAYS") {
            self.market.set_holidays_csv(&raw);
        }
        if let Some(raw) = get("DATA_DIR") {
            self.data.dir = raw.trim().to_string();
        }
        Ok(())
    }

    /// Validate configuration values.
    ///
    /// Credentials are not checked here; see [`Config::credential_issues`].
    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "database" }.into());
        }
        if self.env_file.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "env_file" }.into());
        }

        if let Some(issue) = validate_limits(&self.risk_limits(), self.mode)
            .into_iter()
            .next()
        {
            return Err(ConfigError::from(issue).into());
        }
        if self.risk.balance_buffer < Decimal::ONE {
            return Err(invalid("risk.balance_buffer", "must be >= 1").into());
        }
        if self.risk.sizing_fraction <= Decimal::ZERO || self.risk.sizing_fraction > Decimal::ONE {
            return Err(invalid("risk.sizing_fraction", "must be in (0, 1]").into());
        }

        if self.auth.postback_host.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "auth.postback_host",
            }
            .into());
        }
        if self.auth.postback_port == 0 {
            return Err(invalid("auth.postback_port", "must be greater than 0").into());
        }
        if self.auth.timeout_secs == 0 {
            return Err(invalid("auth.timeout_secs", "must be greater than 0").into());
        }
        if self.auth.cleanup_interval_secs == 0 {
            return Err(invalid("auth.cleanup_interval_secs", "must be greater than 0").into());
        }
        if let Some(url) = &self.auth.public_url {
            url::Url::parse(url).map_err(|e| invalid("auth.public_url", e.to_string()))?;
        }

        if self.kite.timeout_secs == 0 {
            return Err(invalid("kite.timeout_secs", "must be greater than 0").into());
        }
        url::Url::parse(&self.kite.base_url)
            .map_err(|e| invalid("kite.base_url", e.to_string()))?;

        if self.telegram.max_messages_per_minute == 0 {
            return Err(invalid("telegram.max_messages_per_minute", "must be greater than 0").into());
        }

        self.strategy.validate()?;
        self.market.calendar()?;
        self.data.validate()?;
        Ok(())
    }

    /// Risk limits for [`crate::application::state::AppState`].
    #[must_use]
    pub fn risk_limits(&self) -> RiskLimits {
        RiskLimits::from(&self.risk)
    }

    #[must_use]
    pub fn credential_presence(&self) -> CredentialPresence {
        CredentialPresence {
            api_key: self.secrets.api_key.is_some(),
            access_token: self.secrets.access_token.is_some(),
        }
    }

    /// Limit and credential problems that block `run` in the configured mode.
    #[must_use]
    pub fn credential_issues(&self) -> Vec<RiskIssue> {
        validate(&self.risk_limits(), self.mode, self.credential_presence())
    }

    /// Initialize the global tracing subscriber.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
