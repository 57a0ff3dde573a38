//! Path utilities for sensexbot.
//!
//! Operator data lives under `~/.sensexbot/`:
//! - `~/.sensexbot/config.toml` - main configuration
//! - `~/.sensexbot/sensexbot.db` - default database for `status` and `report`

use std::path::PathBuf;

/// Returns the sensexbot home directory (`~/.sensexbot/`).
pub fn home_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sensexbot")
}

/// Returns the default config file path (`~/.sensexbot/config.toml`).
pub fn default_config() -> PathBuf {
    home_dir().join("config.toml")
}

/// Returns the default database path (`~/.sensexbot/sensexbot.db`).
pub fn default_database() -> PathBuf {
    home_dir().join("sensexbot.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_under_sensexbot_home() {
        assert!(home_dir().ends_with(".sensexbot"));
        assert!(default_config().ends_with(".sensexbot/config.toml"));
        assert!(default_database().ends_with(".sensexbot/sensexbot.db"));
    }
}
