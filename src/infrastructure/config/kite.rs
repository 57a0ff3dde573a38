//! Kite Connect client settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::secrets::Secrets;
use crate::adapter::outbound::kite::{KiteConfig, KITE_API_URL};

/// `[kite]` section. The api key and secret come from the environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KiteAppConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for KiteAppConfig {
    fn default() -> Self {
        Self {
            base_url: KITE_API_URL.into(),
            timeout_secs: 10,
        }
    }
}

impl KiteAppConfig {
    /// Client settings, or `None` without an api key.
    #[must_use]
    pub fn client_config(&self, secrets: &Secrets) -> Option<KiteConfig> {
        let api_key = secrets.api_key.as_ref()?;
        let mut config = KiteConfig::new(api_key.clone())
            .with_base_url(self.base_url.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs));
        if let Some(secret) = &secrets.api_secret {
            config = config.with_secret(secret.clone());
        }
        Some(config)
    }
}
