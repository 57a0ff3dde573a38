//! Configuration: a TOML file, environment overrides and env-only secrets.

pub mod auth;
pub mod data;
pub mod kite;
pub mod logging;
pub mod market;
pub mod risk;
pub mod secrets;
pub mod settings;
pub mod strategy;
pub mod telegram;

pub use settings::Config;
