//! In-memory credential store and scripted session exchange.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::{AuthError, Error, Result};
use crate::port::outbound::broker::{SessionExchanger, SessionGrant};
use crate::port::outbound::credential::{AuthArchive, CredentialStore, StoredToken};

/// [`CredentialStore`] that keeps everything in memory.
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<StoredToken>>,
    archives: Mutex<Vec<AuthArchive>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str, issued_at: Option<DateTime<Utc>>) -> Self {
        let store = Self::default();
        *store.token.lock() = Some(StoredToken {
            access_token: token.to_string(),
            issued_at,
        });
        store
    }

    pub fn token(&self) -> Option<StoredToken> {
        self.token.lock().clone()
    }

    pub fn archives(&self) -> Vec<AuthArchive> {
        self.archives.lock().clone()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<StoredToken>> {
        Ok(self.token.lock().clone())
    }

    fn save(&self, access_token: &str, issued_at: DateTime<Utc>) -> Result<()> {
        if access_token.len() != 32 {
            return Err(Error::Auth(AuthError::InvalidAccessToken(format!(
                "expected 32 characters, got {}",
                access_token.len()
            ))));
        }
        *self.token.lock() = Some(StoredToken {
            access_token: access_token.to_string(),
            issued_at: Some(issued_at),
        });
        Ok(())
    }

    fn archive(&self, record: &AuthArchive) -> Result<PathBuf> {
        let mut archives = self.archives.lock();
        archives.push(record.clone());
        Ok(PathBuf::from(format!("memory/{}.json", archives.len())))
    }
}

/// [`SessionExchanger`] returning a fixed grant or a fixed failure.
pub struct ScriptedExchanger {
    result: std::result::Result<SessionGrant, String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExchanger {
    pub fn granting(access_token: &str) -> Self {
        Self {
            result: Ok(SessionGrant {
                access_token: access_token.to_string(),
                user_id: "AB1234".to_string(),
                user_name: Some("Test User".to_string()),
                login_time: None,
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Request tokens received so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl SessionExchanger for ScriptedExchanger {
    async fn exchange(&self, request_token: &str) -> Result<SessionGrant> {
        self.calls.lock().push(request_token.to_string());
        self.result.clone().map_err(|message| {
            Error::Broker(crate::error::BrokerError::Api {
                error_type: "TokenException".into(),
                message,
            })
        })
    }
}
