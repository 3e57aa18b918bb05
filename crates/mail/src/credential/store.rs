//! Credential persistence
//!
//! The manager only decides when to refresh; where credentials live is up to
//! the [`CredentialStore`] implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{MailError, Result};
use crate::models::{Credential, UserId};

/// Load/save credential records keyed by user
pub trait CredentialStore: Send + Sync {
    fn load(&self, user_id: &UserId) -> Result<Option<Credential>>;

    /// Insert or replace the record for `credential.user_id`
    fn save(&self, credential: &Credential) -> Result<()>;
}

/// One JSON file per user under a directory
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    /// Subdirectory of the config directory holding credential files
    const DIR_NAME: &'static str = "credentials";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at `<config dir>/credentials`
    pub fn open_default() -> Result<Self> {
        config::config_path(Self::DIR_NAME)
            .map(Self::new)
            .ok_or_else(|| MailError::storage("Could not determine config directory"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, user_id: &UserId) -> PathBuf {
        let file_stem: String = user_id
            .as_str()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file_stem))
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self, user_id: &UserId) -> Result<Option<Credential>> {
        let path = self.path_for(user_id);
        if !path.exists() {
            return Ok(None);
        }
        config::load_json_file(&path)
            .map(Some)
            .map_err(|e| MailError::storage(format!("{:#}", e)))
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        config::save_json_file(&self.path_for(&credential.user_id), credential)
            .map_err(|e| MailError::storage(format!("{:#}", e)))
    }
}

/// In-memory implementation of CredentialStore
///
/// Used by tests and by callers that persist credentials elsewhere.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    credentials: RwLock<HashMap<UserId, Credential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn load(&self, user_id: &UserId) -> Result<Option<Credential>> {
        let credentials = self
            .credentials
            .read()
            .map_err(|_| MailError::storage("credential store lock poisoned"))?;
        Ok(credentials.get(user_id).cloned())
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        let mut credentials = self
            .credentials
            .write()
            .map_err(|_| MailError::storage("credential store lock poisoned"))?;
        credentials.insert(credential.user_id.clone(), credential.clone());
        Ok(())
    }
}
