//! Provider seams
//!
//! The synchronizer, composer and credential manager only see these traits.
//! Access tokens are passed per call so one client serves any number of users.

use super::api::{GmailThread, SendMessageResponse, TokenResponse};
use crate::error::Result;
use crate::headers::HeaderSet;
use crate::models::{MessageId, ThreadId};

/// Operations the mail provider exposes
pub trait MailApi: Send + Sync {
    /// Thread IDs matching `query`, in provider order, at most `max_results`
    fn list_thread_ids(
        &self,
        access_token: &str,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<ThreadId>>;

    /// Thread with message flags and only the requested headers
    fn get_thread_metadata(
        &self,
        access_token: &str,
        id: &ThreadId,
        header_names: &[&str],
    ) -> Result<GmailThread>;

    /// Thread with full message payloads
    fn get_thread_full(&self, access_token: &str, id: &ThreadId) -> Result<GmailThread>;

    /// Selected headers of a single message
    fn get_message_headers(
        &self,
        access_token: &str,
        id: &MessageId,
        header_names: &[&str],
    ) -> Result<HeaderSet>;

    /// Submit an RFC 822 message encoded as unpadded base64url
    fn send_raw_message(
        &self,
        access_token: &str,
        raw: &str,
        thread_id: Option<&ThreadId>,
    ) -> Result<SendMessageResponse>;
}

/// OAuth token endpoint used to refresh access tokens
pub trait TokenEndpoint: Send + Sync {
    fn refresh(&self, refresh_token: &str) -> Result<TokenResponse>;
}
