//! Gmail API integration
//!
//! This module provides:
//! - The [`MailApi`] and [`TokenEndpoint`] seams the rest of the crate talks to
//! - A ureq-backed Gmail REST client and OAuth2 token endpoint
//! - Response normalization to domain models

mod auth;
mod client;
mod normalize;
mod traits;

pub use auth::GmailAuth;
pub use client::GmailClient;
pub use normalize::{
    NO_SUBJECT, decode_html_entities, message_headers, normalize_message, parse_message_date, summarize_thread,
    to_body_part,
};
pub use traits::{MailApi, TokenEndpoint};

/// Gmail API response types
pub mod api {
    use serde::{Deserialize, Serialize};

    pub use crate::headers::Header;

    /// Label Gmail puts on unread messages
    pub const UNREAD_LABEL: &str = "UNREAD";

    /// Response from listing threads
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListThreadsResponse {
        pub threads: Option<Vec<ThreadRef>>,
        pub next_page_token: Option<String>,
        pub result_size_estimate: Option<u32>,
    }

    /// Reference to a thread as returned by the list endpoint
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ThreadRef {
        pub id: String,
        #[serde(default)]
        pub snippet: Option<String>,
    }

    /// Thread resource; `messages` is ordered oldest first
    #[derive(Debug, Clone, Default, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailThread {
        pub id: String,
        #[serde(default)]
        pub messages: Option<Vec<GmailMessage>>,
    }

    /// Message resource (metadata or full format)
    #[derive(Debug, Clone, Default, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessage {
        pub id: String,
        pub thread_id: String,
        #[serde(default)]
        pub label_ids: Option<Vec<String>>,
        #[serde(default)]
        pub snippet: Option<String>,
        /// Milliseconds since epoch, as a string
        #[serde(default)]
        pub internal_date: Option<String>,
        #[serde(default)]
        pub payload: Option<MessagePart>,
    }

    impl GmailMessage {
        pub fn has_label(&self, label: &str) -> bool {
            self.label_ids
                .as_ref()
                .is_some_and(|labels| labels.iter().any(|l| l == label))
        }
    }

    /// Message part; the top-level payload uses the same shape
    #[derive(Debug, Clone, Default, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePart {
        pub part_id: Option<String>,
        pub mime_type: Option<String>,
        pub filename: Option<String>,
        pub headers: Option<Vec<Header>>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
    }

    /// Part body; `data` is base64url, absent for attachments
    #[derive(Debug, Clone, Default, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageBody {
        pub size: Option<u32>,
        pub data: Option<String>,
        pub attachment_id: Option<String>,
    }

    /// Body of `messages.send`
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SendMessageRequest {
        pub raw: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub thread_id: Option<String>,
    }

    /// Response from `messages.send`
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SendMessageResponse {
        pub id: String,
        #[serde(default)]
        pub thread_id: Option<String>,
    }

    /// Token response from Google's OAuth endpoint
    #[derive(Debug, Clone, Deserialize)]
    pub struct TokenResponse {
        pub access_token: String,
        pub refresh_token: Option<String>,
        pub expires_in: Option<u64>,
        #[serde(default)]
        pub token_type: Option<String>,
    }
}

#[cfg(test)]
mod tests {
    use super::api::*;

    #[test]
    fn test_deserialize_thread() {
        let json = r#"{
            "id": "t1",
            "historyId": "42",
            "messages": [{
                "id": "m1",
                "threadId": "t1",
                "labelIds": ["INBOX", "UNREAD"],
                "snippet": "Hi &amp; welcome",
                "internalDate": "1700000000000",
                "payload": {
                    "mimeType": "multipart/alternative",
                    "headers": [{"name": "Subject", "value": "Hello"}],
                    "parts": [
                        {"partId": "0", "mimeType": "text/plain", "body": {"size": 2, "data": "aGk"}},
                        {"partId": "1", "mimeType": "application/pdf", "filename": "a.pdf",
                         "body": {"size": 100, "attachmentId": "att-1"}}
                    ]
                }
            }]
        }"#;

        let thread: GmailThread = serde_json::from_str(json).unwrap();
        let messages = thread.messages.unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].has_label(UNREAD_LABEL));
        let parts = messages[0].payload.as_ref().unwrap().parts.as_ref().unwrap();
        assert_eq!(parts[1].body.as_ref().unwrap().attachment_id.as_deref(), Some("att-1"));
    }

    #[test]
    fn test_serialize_send_request_omits_missing_thread() {
        let request = SendMessageRequest {
            raw: "abc".to_string(),
            thread_id: None,
        };
        assert_eq!(serde_json::to_string(&request).unwrap(), r#"{"raw":"abc"}"#);

        let request = SendMessageRequest {
            raw: "abc".to_string(),
            thread_id: Some("t1".to_string()),
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"raw":"abc","threadId":"t1"}"#
        );
    }

    #[test]
    fn test_deserialize_token_response_without_refresh_token() {
        let json = r#"{"access_token": "ya29.new", "expires_in": 3599, "token_type": "Bearer"}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "ya29.new");
        assert_eq!(token.refresh_token, None);
        assert_eq!(token.expires_in, Some(3599));
    }
}
