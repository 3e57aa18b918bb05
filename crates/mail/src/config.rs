//! Configuration loading for mail services
//!
//! Two things are configurable:
//! - OAuth client credentials ([`GmailCredentials`])
//! - Runtime tunables such as timeouts and fan-out width ([`MailConfig`])

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Credentials filename in the Missive config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";

/// Tunables filename in the Missive config directory
const MAIL_CONFIG_FILE: &str = "mail.json";

/// OAuth client credentials for Gmail API access
#[derive(Debug, Clone)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Google Cloud Console credential file format
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<InstalledCredentials>,
    web: Option<InstalledCredentials>,
}

#[derive(Deserialize)]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
}

impl GmailCredentials {
    /// Load credentials using the following priority:
    /// 1. Compile-time embedded credentials
    /// 2. `google-credentials.json` in the config directory
    /// 3. `GMAIL_CLIENT_ID` / `GMAIL_CLIENT_SECRET` environment variables
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let creds: GoogleCredentialFile = config::load_json(CREDENTIALS_FILE)?;
            return Self::from_credential_file(creds);
        }

        Self::from_env()
    }

    /// Credentials embedded at build time via `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET`
    pub fn from_compile_time() -> Option<Self> {
        let client_id = option_env!("GOOGLE_CLIENT_ID")?;
        let client_secret = option_env!("GOOGLE_CLIENT_SECRET")?;

        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }

        Some(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: GoogleCredentialFile = config::load_json_file(path)?;
        Self::from_credential_file(creds)
    }

    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        // Desktop apps get "installed", web apps get "web"
        let installed = creds
            .installed
            .or(creds.web)
            .context("Credentials file missing 'installed' or 'web' section")?;

        Ok(Self {
            client_id: installed.client_id,
            client_secret: installed.client_secret,
        })
    }

    /// Parse credentials from JSON string (Google Cloud Console format)
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(creds)
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("GMAIL_CLIENT_ID")
            .context("GMAIL_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("GMAIL_CLIENT_SECRET")
            .context("GMAIL_CLIENT_SECRET environment variable not set")?;

        Ok(Self {
            client_id,
            client_secret,
        })
    }

    /// Default credentials file path
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }
}

/// Runtime tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Upper bound for every provider and token-endpoint call
    pub request_timeout_secs: u64,
    /// Concurrent metadata fetches while listing summaries
    pub fan_out_concurrency: usize,
    /// Tokens this close to expiry are refreshed early
    pub expiry_margin_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            fan_out_concurrency: 8,
            expiry_margin_secs: 0,
        }
    }
}

impl MailConfig {
    /// Load `mail.json` from the config directory, falling back to defaults
    /// when the file doesn't exist
    pub fn load() -> Result<Self> {
        if config::config_exists(MAIL_CONFIG_FILE) {
            return config::load_json(MAIL_CONFIG_FILE);
        }
        Ok(Self::default())
    }

    /// Parse from a JSON string; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse mail config JSON")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Fan-out width, never below one
    pub fn fan_out(&self) -> usize {
        self.fan_out_concurrency.max(1)
    }

    /// Early-refresh margin, capped at one day
    pub fn expiry_margin(&self) -> chrono::Duration {
        const MAX_MARGIN_SECS: u64 = 24 * 60 * 60;
        chrono::Duration::seconds(self.expiry_margin_secs.min(MAX_MARGIN_SECS) as i64)
    }
}
