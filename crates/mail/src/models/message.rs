//! Message model representing one decoded Gmail message

use super::ThreadId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a message (Gmail message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single message within a conversation, with its body decoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDetail {
    /// Gmail message ID
    pub id: MessageId,
    /// ID of the conversation this message belongs to
    pub conversation_id: ThreadId,
    /// Raw `From` header (e.g., `Alice <a@x.com>`)
    pub from: String,
    /// Bare recipient addresses from the `To` header
    pub to: Vec<String>,
    pub subject: String,
    pub date: DateTime<Utc>,
    /// Decoded body content
    pub body: String,
    /// Whether `body` is HTML
    pub is_rich: bool,
    /// RFC 822 `Message-ID` header, used to thread replies
    pub rfc822_message_id: Option<String>,
}
