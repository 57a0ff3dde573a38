//! Access token persistence port.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{AuthStatus, TradingMode};
use crate::error::Result;

/// Access token as last persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredToken {
    pub access_token: String,
    pub issued_at: Option<DateTime<Utc>>,
}

/// Sanitized record of one login attempt. Holds only a token preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthArchive {
    pub state: String,
    pub mode: TradingMode,
    pub status: AuthStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub token_preview: Option<String>,
    pub error: Option<String>,
}

/// Where the access token lives between runs.
pub trait CredentialStore: Send + Sync {
    /// Current token, if any.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing file exists but cannot be read.
    fn load(&self) -> Result<Option<StoredToken>>;

    /// Persist a newly issued token.
    ///
    /// # Errors
    ///
    /// Rejects tokens that are not 32 characters and propagates I/O failures.
    fn save(&self, access_token: &str, issued_at: DateTime<Utc>) -> Result<()>;

    /// Write an archive record and return its path.
    ///
    /// # Errors
    ///
    /// Propagates I/O and serialization failures.
    fn archive(&self, record: &AuthArchive) -> Result<PathBuf>;
}
