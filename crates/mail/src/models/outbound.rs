//! Outbound message request and send result

use serde::{Deserialize, Serialize};

use super::{MessageId, ThreadId};

/// A message to send, optionally as a reply within an existing conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessageRequest {
    /// Recipient address; may be left empty when replying to use the original sender
    pub to: String,
    /// Explicit subject; derived from the original message when absent
    pub subject: Option<String>,
    /// HTML body
    pub body: String,
    /// Conversation the provider should file the message under
    pub conversation_id: Option<ThreadId>,
    /// Gmail ID of the message being replied to
    pub in_reply_to_id: Option<MessageId>,
    /// Existing `References` chain to extend
    pub references_id: Option<String>,
}

impl OutboundMessageRequest {
    /// A fresh message (not a reply)
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: Some(subject.into()),
            body: body.into(),
            ..Self::default()
        }
    }

    /// A reply to `message_id` inside `conversation_id`, subject derived from the original
    pub fn reply(
        conversation_id: ThreadId,
        message_id: MessageId,
        to: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: None,
            body: body.into(),
            conversation_id: Some(conversation_id),
            in_reply_to_id: Some(message_id),
            references_id: None,
        }
    }
}

/// Provider acknowledgement of a sent message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub message_id: MessageId,
    pub conversation_id: Option<ThreadId>,
}
