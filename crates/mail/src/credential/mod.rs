//! OAuth credential lifecycle
//!
//! - [`CredentialManager`] decides when to refresh and serializes refreshes per user
//! - [`CredentialStore`] implementations persist the result

mod manager;
mod store;

pub use manager::{CredentialManager, apply_token_response};
pub use store::{CredentialStore, FileCredentialStore, InMemoryCredentialStore};
