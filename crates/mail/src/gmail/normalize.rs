//! Gmail API response normalization
//!
//! Converts Gmail API responses to Missive domain models.

use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;

use super::api::{GmailMessage, GmailThread, MessagePart, UNREAD_LABEL};
use crate::headers::{HeaderSet, names, parse_address_list};
use crate::mime::{BodyPart, extract_body};
use crate::models::{ConversationSummary, MessageDetail, MessageId, ThreadId};

/// Subject used when a message has none
pub const NO_SUBJECT: &str = "(No Subject)";

/// Headers of a message's top-level payload
pub fn message_headers(message: &GmailMessage) -> HeaderSet {
    message
        .payload
        .as_ref()
        .and_then(|p| p.headers.clone())
        .map(HeaderSet::from)
        .unwrap_or_default()
}

/// Convert a Gmail part tree into a [`BodyPart`]
///
/// Parts with children become composites. Everything else is a leaf whose
/// payload is the inline data, so attachments (which carry an attachment ID
/// instead) read as empty.
pub fn to_body_part(part: &MessagePart) -> BodyPart {
    let content_type = part.mime_type.clone().unwrap_or_default();
    match &part.parts {
        Some(children) if !children.is_empty() => {
            BodyPart::composite(content_type, children.iter().map(to_body_part).collect())
        }
        _ => BodyPart::leaf(
            content_type,
            part.body.as_ref().and_then(|b| b.data.clone()),
        ),
    }
}

/// Normalize a full-format Gmail message
pub fn normalize_message(message: &GmailMessage) -> MessageDetail {
    let headers = message_headers(message);
    let extracted = message
        .payload
        .as_ref()
        .map(|p| extract_body(&to_body_part(p)))
        .unwrap_or_default();

    MessageDetail {
        id: MessageId::new(&message.id),
        conversation_id: ThreadId::new(&message.thread_id),
        from: headers.get(names::FROM).unwrap_or_default().to_string(),
        to: headers
            .get(names::TO)
            .map(|to| {
                parse_address_list(to)
                    .into_iter()
                    .map(|a| a.email)
                    .collect()
            })
            .unwrap_or_default(),
        subject: headers.get_or(names::SUBJECT, NO_SUBJECT).to_string(),
        date: message_date(&headers, message),
        body: extracted.body,
        is_rich: extracted.is_rich,
        rfc822_message_id: headers.get(names::MESSAGE_ID).map(str::to_string),
    }
}

/// Build a summary from a thread's messages
///
/// Returns `None` for a thread without messages.
pub fn summarize_thread(thread: &GmailThread) -> Option<ConversationSummary> {
    let messages = thread.messages.as_deref().unwrap_or_default();
    let first = messages.first()?;
    let last = messages.last()?;

    let first_headers = message_headers(first);
    let last_headers = message_headers(last);

    Some(ConversationSummary {
        id: ThreadId::new(&thread.id),
        subject: first_headers.get_or(names::SUBJECT, NO_SUBJECT).to_string(),
        snippet: last
            .snippet
            .as_deref()
            .map(decode_html_entities)
            .unwrap_or_default(),
        participants: collect_participants(messages),
        last_message_at: message_date(&last_headers, last),
        unread: last.has_label(UNREAD_LABEL),
        message_count: messages.len(),
        last_sender: last_headers.get(names::FROM).unwrap_or_default().to_string(),
    })
}

/// Distinct From/To addresses across all messages, first-seen order
fn collect_participants(messages: &[GmailMessage]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut participants = Vec::new();

    for message in messages {
        let headers = message_headers(message);
        let addresses = [names::FROM, names::TO]
            .into_iter()
            .filter_map(|name| headers.get(name))
            .flat_map(parse_address_list);

        for address in addresses {
            if !address.email.is_empty() && seen.insert(address.email.to_lowercase()) {
                participants.push(address.email);
            }
        }
    }

    participants
}

/// Message timestamp from the `Date` header, falling back to Gmail's internal date
fn message_date(headers: &HeaderSet, message: &GmailMessage) -> DateTime<Utc> {
    headers
        .get(names::DATE)
        .and_then(parse_message_date)
        .or_else(|| {
            message
                .internal_date
                .as_deref()
                .and_then(|d| d.parse::<i64>().ok())
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        })
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Parse an RFC 2822 `Date` header
///
/// Tolerates a trailing comment such as `(UTC)` or `(PST)`.
pub fn parse_message_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let without_comment = match value.rfind('(') {
        Some(idx) if value.ends_with(')') => value[..idx].trim_end(),
        _ => value,
    };
    DateTime::parse_from_rfc2822(without_comment)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Decode HTML entities in snippet text
pub fn decode_html_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
