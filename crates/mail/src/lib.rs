//! Mail crate - Gmail synchronization and reply composition
//!
//! This crate provides:
//! - Domain models (ConversationSummary, MessageDetail, Credential)
//! - Gmail API client and OAuth authentication
//! - Credential lifecycle with per-user refresh serialization
//! - Category-based conversation listing with bounded fan-out
//! - RFC 822 message composition with reply threading
//!
//! Everything is synchronous; callers pick their own threads.

pub mod compose;
pub mod config;
pub mod credential;
pub mod error;
pub mod gmail;
pub mod headers;
pub mod mime;
pub mod models;
pub mod service;
pub mod sync;

pub use compose::{OutboundMessage, build_message, derive_reply_subject};
pub use config::{GmailCredentials, MailConfig};
pub use credential::{
    CredentialManager, CredentialStore, FileCredentialStore, InMemoryCredentialStore,
};
pub use error::{MailError, Result};
pub use gmail::{GmailAuth, GmailClient, MailApi, TokenEndpoint};
pub use headers::{Header, HeaderSet};
pub use mime::{BodyPart, ExtractedBody, decode_base64url, extract_body};
pub use models::{
    ConversationDetail, ConversationSummary, Credential, CredentialState, EmailAddress,
    MessageDetail, MessageId, OutboundMessageRequest, SentMessage, ThreadId, UserId,
};
pub use service::MailService;
pub use sync::{Category, FailedFetch, SummaryBatch, ThreadSynchronizer};
