//! Gmail API HTTP client
//!
//! Implements [`MailApi`] over the Gmail REST API.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use log::debug;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::MailApi;
use super::api::{
    GmailMessage, GmailThread, ListThreadsResponse, SendMessageRequest, SendMessageResponse,
};
use crate::config::MailConfig;
use crate::error::{MailError, Result};
use crate::headers::HeaderSet;
use crate::models::{MessageId, ThreadId};

/// Gmail API client
///
/// Holds only a connection pool; the access token is supplied per call.
pub struct GmailClient {
    agent: ureq::Agent,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1/users/me";

    /// Largest page the list endpoints accept
    const MAX_PAGE_SIZE: usize = 500;

    pub fn new(config: &MailConfig) -> Self {
        Self::with_timeout(config.request_timeout())
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        access_token: &str,
        path: &str,
        query: &[(&str, &str)],
        what: &str,
    ) -> Result<T> {
        let url = format!("{}/{}", Self::BASE_URL, path);
        let response = self
            .agent
            .get(&url)
            .header("Authorization", &bearer(access_token))
            .query_pairs(query.iter().copied())
            .call()
            .map_err(|e| transport_error(what, e))?;
        read_json(response, what)
    }
}

impl MailApi for GmailClient {
    fn list_thread_ids(
        &self,
        access_token: &str,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<ThreadId>> {
        let mut ids: Vec<ThreadId> = Vec::new();
        let mut page_token: Option<String> = None;

        while ids.len() < max_results {
            let page_size = (max_results - ids.len()).min(Self::MAX_PAGE_SIZE).to_string();
            let mut params = vec![("q", query), ("maxResults", page_size.as_str())];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.as_str()));
            }

            let page: ListThreadsResponse =
                self.get_json(access_token, "threads", &params, "list threads")?;
            ids.extend(
                page.threads
                    .unwrap_or_default()
                    .into_iter()
                    .map(|t| ThreadId::new(t.id)),
            );

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        ids.truncate(max_results);
        debug!("Listed {} threads for query {:?}", ids.len(), query);
        Ok(ids)
    }

    fn get_thread_metadata(
        &self,
        access_token: &str,
        id: &ThreadId,
        header_names: &[&str],
    ) -> Result<GmailThread> {
        let mut params = vec![("format", "metadata")];
        params.extend(header_names.iter().map(|name| ("metadataHeaders", *name)));

        let path = format!("threads/{}", urlencoding::encode(id.as_str()));
        self.get_json(access_token, &path, &params, &format!("thread {}", id))
    }

    fn get_thread_full(&self, access_token: &str, id: &ThreadId) -> Result<GmailThread> {
        let path = format!("threads/{}", urlencoding::encode(id.as_str()));
        self.get_json(
            access_token,
            &path,
            &[("format", "full")],
            &format!("thread {}", id),
        )
    }

    fn get_message_headers(
        &self,
        access_token: &str,
        id: &MessageId,
        header_names: &[&str],
    ) -> Result<HeaderSet> {
        let mut params = vec![("format", "metadata")];
        params.extend(header_names.iter().map(|name| ("metadataHeaders", *name)));

        let path = format!("messages/{}", urlencoding::encode(id.as_str()));
        let message: GmailMessage =
            self.get_json(access_token, &path, &params, &format!("message {}", id))?;

        Ok(message
            .payload
            .and_then(|p| p.headers)
            .map(HeaderSet::from)
            .unwrap_or_default())
    }

    fn send_raw_message(
        &self,
        access_token: &str,
        raw: &str,
        thread_id: Option<&ThreadId>,
    ) -> Result<SendMessageResponse> {
        let url = format!("{}/messages/send", Self::BASE_URL);
        let request = SendMessageRequest {
            raw: raw.to_string(),
            thread_id: thread_id.map(|t| t.as_str().to_string()),
        };

        let response = self
            .agent
            .post(&url)
            .header("Authorization", &bearer(access_token))
            .send_json(&request)
            .map_err(|e| transport_error("send message", e))?;
        read_json(response, "send message")
    }
}

/// Build an agent that bounds every call and hands non-2xx responses back
/// so their bodies can be reported
pub(super) fn build_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build();
    ureq::Agent::new_with_config(config)
}

fn bearer(access_token: &str) -> String {
    format!("Bearer {}", access_token)
}

fn transport_error(what: &str, e: ureq::Error) -> MailError {
    MailError::provider(None, format!("Failed to send {} request: {}", what, e))
}

/// Decode a JSON response, mapping non-2xx statuses to typed errors
pub(super) fn read_json<T: DeserializeOwned>(
    mut response: ureq::http::Response<ureq::Body>,
    what: &str,
) -> Result<T> {
    let status = response.status().as_u16();
    if !response.status().is_success() {
        let body = response.body_mut().read_to_string().unwrap_or_default();
        return Err(status_error(status, what, body));
    }

    response
        .body_mut()
        .read_json::<T>()
        .map_err(|e| MailError::parse(format!("Failed to parse {} response: {}", what, e)))
}

fn status_error(status: u16, what: &str, body: String) -> MailError {
    match status {
        401 | 403 => MailError::auth(format!("{} rejected ({}): {}", what, status, body)),
        404 => MailError::not_found(what),
        _ if body.trim().is_empty() => MailError::provider(Some(status), format!("{} failed", what)),
        _ => MailError::provider(Some(status), body),
    }
}
