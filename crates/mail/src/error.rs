//! Error types for mail operations

/// Errors returned by the caller-facing mail operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailError {
    /// Credential missing, failed, or rejected by the provider
    #[error("Authentication required: {message}")]
    Auth { message: String },

    /// The token endpoint refused or could not be reached during refresh
    #[error("Token refresh failed: {cause}")]
    RefreshFailed { cause: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Transport failure or non-2xx response from the mail API
    #[error("Provider error{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Provider { status: Option<u16>, message: String },

    #[error("Parse error: {message}")]
    Parse { message: String },

    /// An outbound message was rejected or could not be built
    #[error("Compose failed: {message}")]
    Compose { message: String },

    #[error("Credential storage error: {message}")]
    Storage { message: String },
}

impl MailError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn compose(message: impl Into<String>) -> Self {
        Self::Compose {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Whether the caller should prompt the user to sign in again
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::RefreshFailed { .. })
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, MailError>;
