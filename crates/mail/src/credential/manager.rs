//! Credential lifecycle manager
//!
//! Hands out credentials whose access token is still valid, refreshing
//! through the [`TokenEndpoint`] when needed. Refreshes are serialized per
//! user: concurrent callers holding the same expired credential wait for the
//! one in-flight refresh and reuse its result.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::CredentialStore;
use crate::error::{MailError, Result};
use crate::gmail::TokenEndpoint;
use crate::gmail::api::TokenResponse;
use crate::models::{Credential, CredentialState, UserId};

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

pub struct CredentialManager {
    tokens: Arc<dyn TokenEndpoint>,
    store: Arc<dyn CredentialStore>,
    margin: Duration,
    /// Per-user refresh lock guarding the last credential this manager issued
    refresh_locks: Mutex<HashMap<UserId, Arc<Mutex<Option<Credential>>>>>,
}

impl CredentialManager {
    pub fn new(tokens: Arc<dyn TokenEndpoint>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            tokens,
            store,
            margin: Duration::zero(),
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Refresh tokens this long before they actually expire
    pub fn with_expiry_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }

    /// Return a credential whose access token is valid right now
    ///
    /// A valid credential comes back unchanged without any I/O. An expired one
    /// is refreshed (once per user, however many callers ask) and the result
    /// is written back to the store. A failed credential is terminal.
    pub fn ensure_valid(&self, credential: &Credential) -> Result<Credential> {
        match credential.state_at(Utc::now(), self.margin) {
            CredentialState::Valid => return Ok(credential.clone()),
            CredentialState::Failed => return Err(failed_error(credential)),
            CredentialState::Expired => {}
        }

        let lock = self.refresh_lock(&credential.user_id)?;
        let mut last_issued = lock
            .lock()
            .map_err(|_| MailError::auth("credential refresh lock poisoned"))?;

        // Another caller may have finished a refresh while we waited
        if let Some(stored) = self.store.load(&credential.user_id)? {
            match stored.state_at(Utc::now(), self.margin) {
                CredentialState::Valid => {
                    debug!("Reusing credential refreshed for {}", stored.user_id);
                    return Ok(stored);
                }
                CredentialState::Failed if stored.refresh_token == credential.refresh_token => {
                    return Err(failed_error(&stored));
                }
                _ => {}
            }
        }

        // The store may have failed to record our last refresh
        if let Some(issued) = last_issued
            .as_ref()
            .filter(|c| c.is_valid_at(Utc::now(), self.margin))
        {
            debug!("Reusing unsaved credential for {}", issued.user_id);
            return Ok(issued.clone());
        }

        let refreshed = self.refresh(credential)?;
        *last_issued = Some(refreshed.clone());
        Ok(refreshed)
    }

    fn refresh(&self, credential: &Credential) -> Result<Credential> {
        info!("Refreshing access token for {}", credential.user_id);

        match self.tokens.refresh(&credential.refresh_token) {
            Ok(response) => {
                let now = Utc::now();
                let refreshed = apply_token_response(credential, response, now);
                if !refreshed.is_valid_at(now, self.margin) {
                    // Keep the stored record usable; the refresh token itself was accepted
                    warn!(
                        "Token endpoint issued an already-expired token for {}",
                        credential.user_id
                    );
                    return Err(MailError::RefreshFailed {
                        cause: "issued access token expires immediately".to_string(),
                    });
                }
                if let Err(save_err) = self.store.save(&refreshed) {
                    warn!("Could not save refreshed credential: {}", save_err);
                }
                Ok(refreshed)
            }
            Err(e) => {
                let cause = match e {
                    MailError::RefreshFailed { cause } => cause,
                    other => other.to_string(),
                };
                warn!("Token refresh failed for {}: {}", credential.user_id, cause);

                let mut failed = credential.clone();
                failed.last_error = Some(cause.clone());
                if let Err(save_err) = self.store.save(&failed) {
                    warn!("Could not record failed credential: {}", save_err);
                }
                Err(MailError::RefreshFailed { cause })
            }
        }
    }

    fn refresh_lock(&self, user_id: &UserId) -> Result<Arc<Mutex<Option<Credential>>>> {
        let mut locks = self
            .refresh_locks
            .lock()
            .map_err(|_| MailError::auth("credential lock registry poisoned"))?;
        Ok(locks.entry(user_id.clone()).or_default().clone())
    }
}

fn failed_error(credential: &Credential) -> MailError {
    MailError::auth(format!(
        "credential for {} is no longer usable ({}); sign in again",
        credential.user_id,
        credential.last_error.as_deref().unwrap_or("refresh failed")
    ))
}

/// Apply a token endpoint response to a credential
///
/// The refresh token is replaced only when the endpoint issued a new one.
pub fn apply_token_response(
    credential: &Credential,
    response: TokenResponse,
    now: DateTime<Utc>,
) -> Credential {
    let lifetime = response.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
    Credential {
        user_id: credential.user_id.clone(),
        access_token: response.access_token,
        refresh_token: response
            .refresh_token
            .unwrap_or_else(|| credential.refresh_token.clone()),
        expires_at: i64::try_from(lifetime)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
        last_error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::InMemoryCredentialStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    struct FakeTokens {
        calls: AtomicUsize,
        fail: bool,
        delay_ms: u64,
        lifetime_secs: u64,
        rotate_refresh_token: bool,
    }

    impl FakeTokens {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
                delay_ms: 0,
                lifetime_secs: 3600,
                rotate_refresh_token: false,
            }
        }

        fn rotating() -> Self {
            Self {
                rotate_refresh_token: true,
                ..Self::ok()
            }
        }

        fn with_lifetime(lifetime_secs: u64) -> Self {
            Self {
                lifetime_secs,
                ..Self::ok()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::ok()
            }
        }

        fn slow(delay_ms: u64) -> Self {
            Self {
                delay_ms,
                ..Self::ok()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TokenEndpoint for FakeTokens {
        fn refresh(&self, _refresh_token: &str) -> Result<TokenResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.delay_ms > 0 {
                thread::sleep(std::time::Duration::from_millis(self.delay_ms));
            }
            if self.fail {
                return Err(MailError::RefreshFailed {
                    cause: "invalid_grant".to_string(),
                });
            }
            Ok(TokenResponse {
                access_token: format!("access-{}", n),
                refresh_token: self
                    .rotate_refresh_token
                    .then(|| format!("refresh-{}", n)),
                expires_in: Some(self.lifetime_secs),
                token_type: Some("Bearer".to_string()),
            })
        }
    }

    /// Store that reads nothing and refuses every write
    struct FullDiskStore;

    impl CredentialStore for FullDiskStore {
        fn load(&self, _user_id: &UserId) -> Result<Option<Credential>> {
            Ok(None)
        }

        fn save(&self, _credential: &Credential) -> Result<()> {
            Err(MailError::storage("disk full"))
        }
    }

    fn make_credential(expires_in_secs: i64) -> Credential {
        Credential::new(
            UserId::new("me@example.com"),
            "access-0",
            "refresh-0",
            Utc::now() + Duration::seconds(expires_in_secs),
        )
    }

    fn make_manager(tokens: Arc<FakeTokens>) -> (CredentialManager, Arc<InMemoryCredentialStore>) {
        let store = Arc::new(InMemoryCredentialStore::new());
        (CredentialManager::new(tokens, store.clone()), store)
    }

    #[test]
    fn test_valid_credential_returned_unchanged() {
        let tokens = Arc::new(FakeTokens::ok());
        let (manager, _) = make_manager(tokens.clone());
        let credential = make_credential(600);

        assert_eq!(manager.ensure_valid(&credential).unwrap(), credential);
        assert_eq!(tokens.calls(), 0);
    }

    #[test]
    fn test_expired_credential_is_refreshed_and_saved() {
        let tokens = Arc::new(FakeTokens::ok());
        let (manager, store) = make_manager(tokens.clone());
        let credential = make_credential(-10);

        let refreshed = manager.ensure_valid(&credential).unwrap();
        assert_eq!(tokens.calls(), 1);
        assert_eq!(refreshed.access_token, "access-1");
        assert_eq!(refreshed.refresh_token, "refresh-0");
        assert!(refreshed.expires_at > Utc::now());
        assert_eq!(store.load(&credential.user_id).unwrap(), Some(refreshed));
    }

    #[test]
    fn test_margin_triggers_early_refresh() {
        let tokens = Arc::new(FakeTokens::ok());
        let (manager, _) = make_manager(tokens.clone());
        let manager = manager.with_expiry_margin(Duration::seconds(120));

        manager.ensure_valid(&make_credential(60)).unwrap();
        assert_eq!(tokens.calls(), 1);
    }

    #[test]
    fn test_refresh_failure_marks_credential_failed() {
        let tokens = Arc::new(FakeTokens::failing());
        let (manager, store) = make_manager(tokens.clone());
        let credential = make_credential(-10);

        let err = manager.ensure_valid(&credential).unwrap_err();
        assert_eq!(
            err,
            MailError::RefreshFailed {
                cause: "invalid_grant".to_string()
            }
        );

        let stored = store.load(&credential.user_id).unwrap().unwrap();
        assert_eq!(stored.last_error.as_deref(), Some("invalid_grant"));

        // Retrying with the stale copy must not hit the endpoint again
        let err = manager.ensure_valid(&credential).unwrap_err();
        assert!(err.is_auth());
        assert_eq!(tokens.calls(), 1);
    }

    #[test]
    fn test_failed_credential_is_terminal() {
        let tokens = Arc::new(FakeTokens::ok());
        let (manager, _) = make_manager(tokens.clone());
        let mut credential = make_credential(600);
        credential.last_error = Some("revoked".to_string());

        let err = manager.ensure_valid(&credential).unwrap_err();
        assert!(matches!(err, MailError::Auth { .. }));
        assert_eq!(tokens.calls(), 0);
    }

    #[test]
    fn test_new_sign_in_recovers_from_failed_record() {
        let tokens = Arc::new(FakeTokens::ok());
        let (manager, store) = make_manager(tokens.clone());

        let mut failed = make_credential(-10);
        failed.last_error = Some("revoked".to_string());
        store.save(&failed).unwrap();

        // Fresh sign-in produced a different refresh token
        let mut signed_in = make_credential(-10);
        signed_in.refresh_token = "refresh-new".to_string();

        let refreshed = manager.ensure_valid(&signed_in).unwrap();
        assert_eq!(refreshed.refresh_token, "refresh-new");
        assert_eq!(tokens.calls(), 1);
    }

    #[test]
    fn test_concurrent_callers_share_one_refresh() {
        let tokens = Arc::new(FakeTokens::slow(50));
        let (manager, _) = make_manager(tokens.clone());
        let manager = Arc::new(manager);
        let credential = make_credential(-10);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                let credential = credential.clone();
                thread::spawn(move || manager.ensure_valid(&credential).unwrap())
            })
            .collect();

        let results: Vec<Credential> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(tokens.calls(), 1);
        assert!(results.iter().all(|c| c.access_token == "access-1"));
    }

    #[test]
    fn test_apply_token_response_replaces_refresh_token_when_issued() {
        let credential = make_credential(-10);
        let now = Utc::now();
        let response = TokenResponse {
            access_token: "new-access".to_string(),
            refresh_token: Some("new-refresh".to_string()),
            expires_in: None,
            token_type: None,
        };

        let updated = apply_token_response(&credential, response, now);
        assert_eq!(updated.refresh_token, "new-refresh");
        assert_eq!(updated.expires_at, now + Duration::seconds(3600));
        assert_eq!(updated.last_error, None);
    }

    #[test]
    fn test_refresh_survives_failed_save() {
        let tokens = Arc::new(FakeTokens::rotating());
        let manager = CredentialManager::new(tokens.clone(), Arc::new(FullDiskStore));
        let credential = make_credential(-10);

        let first = manager.ensure_valid(&credential).unwrap();
        assert_eq!(first.access_token, "access-1");
        assert_eq!(first.refresh_token, "refresh-1");

        // A caller still holding the expired copy gets the unsaved result
        let second = manager.ensure_valid(&credential).unwrap();
        assert_eq!(second, first);
        assert_eq!(tokens.calls(), 1);
    }

    #[test]
    fn test_zero_lifetime_token_is_rejected() {
        let tokens = Arc::new(FakeTokens::with_lifetime(0));
        let (manager, store) = make_manager(tokens.clone());
        let credential = make_credential(-10);

        let err = manager.ensure_valid(&credential).unwrap_err();
        assert!(matches!(err, MailError::RefreshFailed { .. }));
        // The refresh token was accepted, so the record is not marked failed
        assert_eq!(store.load(&credential.user_id).unwrap(), None);
    }

    #[test]
    fn test_lifetime_inside_margin_is_rejected() {
        let tokens = Arc::new(FakeTokens::with_lifetime(60));
        let (manager, _) = make_manager(tokens.clone());
        let manager = manager.with_expiry_margin(Duration::seconds(300));

        let err = manager.ensure_valid(&make_credential(-10)).unwrap_err();
        assert!(matches!(err, MailError::RefreshFailed { .. }));
    }
}
