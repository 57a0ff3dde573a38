use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::error::DomainError;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

/// Postback authentication errors.
///
/// The display strings are returned verbatim to the browser that hit
/// the callback, so they stay short and free of internal detail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid authentication session")]
    UnknownSession,

    #[error("Session already processed")]
    AlreadyProcessed,

    #[error("Session expired")]
    Expired,

    #[error("Invalid request token")]
    InvalidRequestToken,

    #[error("Token exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("invalid access token: {0}")]
    InvalidAccessToken(String),
}

/// Broker (Kite Connect) errors with structured variants.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("not authenticated: access token is missing")]
    NotAuthenticated,

    #[error("Kite API error ({error_type}): {message}")]
    Api { error_type: String, message: String },

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("order rejected: {0}")]
    OrderRejected(String),

    #[error("instrument not found: {0}")]
    InstrumentNotFound(String),
}

/// Risk rule violations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    #[error("trading halted: {reason}")]
    TradingHalted { reason: String },

    #[error("max {limit} trades/day reached ({count})")]
    MaxDailyTrades { count: u32, limit: u32 },

    #[error("halted after {count} consecutive losses (limit {limit})")]
    ConsecutiveLosses { count: u32, limit: u32 },

    #[error("daily loss limit: {pnl} < {limit}")]
    DailyLossLimit { pnl: Decimal, limit: Decimal },

    #[error("position too large: {value} > {limit}")]
    PositionTooLarge { value: Decimal, limit: Decimal },

    #[error("outside market hours (09:15 - 15:30 IST)")]
    MarketClosed,

    #[error("insufficient balance: {available} < {required}")]
    InsufficientBalance {
        available: Decimal,
        required: Decimal,
    },

    #[error("manual reset disabled in config")]
    ManualResetDisabled,
}

impl RiskError {
    /// Stable identifier for alerts and logs.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::TradingHalted { .. } => "trading_halted",
            Self::MaxDailyTrades { .. } => "max_daily_trades",
            Self::ConsecutiveLosses { .. } => "consecutive_losses",
            Self::DailyLossLimit { .. } => "daily_loss_limit",
            Self::PositionTooLarge { .. } => "position_too_large",
            Self::MarketClosed => "market_closed",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::ManualResetDisabled => "manual_reset_disabled",
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Risk(#[from] RiskError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("archive error: {0}")]
    Archive(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Self {
        Error::Database(err.to_string())
    }
}
