//! Postback login server settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// `[auth]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthAppConfig {
    pub postback_host: String,
    pub postback_port: u16,
    pub use_https: bool,
    /// Seconds a login link stays valid.
    pub timeout_secs: u64,
    pub cleanup_interval_secs: u64,
    /// Externally reachable base URL, when the server sits behind a proxy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

impl Default for AuthAppConfig {
    fn default() -> Self {
        Self {
            postback_host: "localhost".into(),
            postback_port: 8080,
            use_https: false,
            timeout_secs: 300,
            cleanup_interval_secs: 60,
            public_url: None,
        }
    }
}

impl AuthAppConfig {
    /// Base URL that Kite redirects the browser to.
    #[must_use]
    pub fn base_url(&self) -> String {
        if let Some(url) = &self.public_url {
            return url.trim_end_matches('/').to_string();
        }
        let scheme = if self.use_https { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.postback_host, self.postback_port)
    }

    #[must_use]
    pub fn postback_url(&self) -> String {
        format!("{}/postback", self.base_url())
    }

    /// Address the HTTP listener binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.postback_host, self.postback_port)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub const fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}
