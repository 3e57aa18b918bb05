//! OAuth credential held per user

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity a credential belongs to (typically the account email)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a credential at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Access token usable as-is
    Valid,
    /// Access token expired (or inside the safety margin); needs a refresh
    Expired,
    /// A refresh was rejected; only a new sign-in recovers
    Failed,
}

/// OAuth credential for one user
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: UserId,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    /// Set when a refresh failed; makes the credential terminal
    #[serde(default)]
    pub last_error: Option<String>,
}

impl Credential {
    pub fn new(
        user_id: UserId,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
            last_error: None,
        }
    }

    /// State of the credential at `now`, treating tokens within `margin` of
    /// expiry as already expired
    pub fn state_at(&self, now: DateTime<Utc>, margin: Duration) -> CredentialState {
        if self.last_error.is_some() {
            CredentialState::Failed
        } else if now + margin < self.expires_at {
            CredentialState::Valid
        } else {
            CredentialState::Expired
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.state_at(now, margin) == CredentialState::Valid
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("last_error", &self.last_error)
            .finish()
    }
}
