//! Conversation models produced by the thread synchronizer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::MessageDetail;

/// Unique identifier for a thread (Gmail thread ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of a conversation for list display
///
/// Built fresh on every fetch; nothing is cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ThreadId,
    /// Subject of the first message
    pub subject: String,
    /// Preview text of the latest message
    pub snippet: String,
    /// Every distinct From/To address across the conversation, first-seen order
    pub participants: Vec<String>,
    /// Timestamp of the most recent message
    pub last_message_at: DateTime<Utc>,
    /// Whether the latest message is unread
    pub unread: bool,
    pub message_count: usize,
    /// Raw `From` header of the latest message
    pub last_sender: String,
}

/// A conversation with all of its messages, oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationDetail {
    pub summary: ConversationSummary,
    pub messages: Vec<MessageDetail>,
}
