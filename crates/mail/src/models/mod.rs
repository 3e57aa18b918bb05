//! Domain models for mail entities

mod address;
mod credential;
mod message;
mod outbound;
mod thread;

pub use address::{EmailAddress, humanize_local_part, initials};
pub use credential::{Credential, CredentialState, UserId};
pub use message::{MessageDetail, MessageId};
pub use outbound::{OutboundMessageRequest, SentMessage};
pub use thread::{ConversationDetail, ConversationSummary, ThreadId};
