//! Credentials read from the environment.
//!
//! Never deserialized from the config file and never printed in full.

use std::fmt;

use crate::domain::mask_secret;

#[derive(Clone, Default)]
pub struct Secrets {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub access_token: Option<String>,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<i64>,
}

impl Secrets {
    /// Read `ZAPI_KEY`, `ZAPI_SECRET`, `ACCESS_TOKEN`, `TELEGRAM_TOKEN`
    /// (or `TELEGRAM_BOT_TOKEN`) and `TELEGRAM_CHAT_ID`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Secrets::from_env`] over an arbitrary lookup. Blank values
    /// count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            api_key: get("ZAPI_KEY"),
            api_secret: get("ZAPI_SECRET"),
            access_token: get("ACCESS_TOKEN"),
            telegram_token: get("TELEGRAM_TOKEN").or_else(|| get("TELEGRAM_BOT_TOKEN")),
            telegram_chat_id: get("TELEGRAM_CHAT_ID").and_then(|v| v.parse().ok()),
        }
    }
}

fn masked(value: Option<&String>) -> Option<String> {
    value.map(|v| mask_secret(v))
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("api_key", &masked(self.api_key.as_ref()))
            .field("api_secret", &masked(self.api_secret.as_ref()))
            .field("access_token", &masked(self.access_token.as_ref()))
            .field("telegram_token", &masked(self.telegram_token.as_ref()))
            .field("telegram_chat_id", &self.telegram_chat_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn reads_every_secret() {
        let secrets = Secrets::from_lookup(lookup(&[
            ("ZAPI_KEY", "key123"),
            ("ZAPI_SECRET", "secret456"),
            ("ACCESS_TOKEN", "abcdefghijklmnopqrstuvwxyz123456"),
            ("TELEGRAM_TOKEN", "123:bot"),
            ("TELEGRAM_CHAT_ID", "-1001"),
        ]));
        assert_eq!(secrets.api_key.as_deref(), Some("key123"));
        assert_eq!(secrets.telegram_chat_id, Some(-1001));
    }

    #[test]
    fn blank_values_are_missing_and_alias_applies() {
        let secrets = Secrets::from_lookup(lookup(&[
            ("ZAPI_KEY", "   "),
            ("TELEGRAM_BOT_TOKEN", "alias"),
            ("TELEGRAM_CHAT_ID", "nope"),
        ]));
        assert!(secrets.api_key.is_none());
        assert_eq!(secrets.telegram_token.as_deref(), Some("alias"));
        assert!(secrets.telegram_chat_id.is_none());
    }

    #[test]
    fn debug_output_is_masked() {
        let secrets = Secrets::from_lookup(lookup(&[(
            "ACCESS_TOKEN",
            "abcdefghijklmnopqrstuvwxyz123456",
        )]));
        let rendered = format!("{secrets:?}");
        assert!(rendered.contains("abcdefgh..."));
        assert!(!rendered.contains("xyz123456"));
    }
}
