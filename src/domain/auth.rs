//! Pending login sessions for the postback flow.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::mode::TradingMode;

const PREVIEW_LEN: usize = 8;

/// Preview of a secret safe for logs and chat: first 8 characters then `...`.
///
/// Values of 8 characters or fewer are fully hidden.
#[must_use]
pub fn mask_secret(secret: &str) -> String {
    if secret.chars().count() <= PREVIEW_LEN {
        return "***".to_string();
    }
    let preview: String = secret.chars().take(PREVIEW_LEN).collect();
    format!("{preview}...")
}

/// State of a pending login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    Pending,
    /// The request token is being exchanged.
    Processing,
    Completed,
    Failed,
    Expired,
}

impl AuthStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

impl AuthStatus {
    /// Completed, failed and expired sessions never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Expired)
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A login started through `/auth/generate` or `/login`, keyed by `state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuth {
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: AuthStatus,
    pub mode: TradingMode,
    pub login_url: String,
    pub postback_url: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl PendingAuth {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == AuthStatus::Pending
    }

    /// No-op once the session is terminal.
    pub fn complete(&mut self, at: DateTime<Utc>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = AuthStatus::Completed;
        self.completed_at = Some(at);
    }

    /// No-op once the session is terminal.
    pub fn fail(&mut self, at: DateTime<Utc>, error: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = AuthStatus::Failed;
        self.completed_at = Some(at);
        self.error = Some(error.into());
    }
}
