//! Outbound message composition
//!
//! Builds an RFC 822 message, threads it onto an earlier message when
//! replying, and submits it through [`MailApi::send_raw_message`].

use base64::prelude::*;
use log::{debug, info, warn};

use crate::error::{MailError, Result};
use crate::gmail::{MailApi, NO_SUBJECT};
use crate::headers::{HeaderSet, names};
use crate::mime::encode_base64url;
use crate::models::{MessageId, OutboundMessageRequest, SentMessage, ThreadId};

/// Prefix marking a reply subject (matched case-sensitively)
pub const REPLY_PREFIX: &str = "Re:";

/// Headers read from the message being replied to
const ORIGINAL_HEADERS: [&str; 4] = [
    names::MESSAGE_ID,
    names::SUBJECT,
    names::FROM,
    names::REFERENCES,
];

const CONTENT_TYPE_HTML: &str = "text/html; charset=utf-8";

/// Bytes of text per encoded-word; base64 of 45 bytes keeps a word at 72 chars
const ENCODED_WORD_BYTES: usize = 45;

/// Subject for a reply to a message titled `original`
///
/// Subjects already starting with `Re:` are reused verbatim.
pub fn derive_reply_subject(original: &str) -> String {
    if original.starts_with(REPLY_PREFIX) {
        original.to_string()
    } else {
        format!("{} {}", REPLY_PREFIX, original)
    }
}

/// A composed message ready to encode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    headers: HeaderSet,
    body: String,
}

impl OutboundMessage {
    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Wire form: header lines, a blank line, then the body, all CRLF-terminated
    pub fn to_rfc822(&self) -> String {
        let mut out = String::new();
        for header in self.headers.iter() {
            out.push_str(&header.name);
            out.push_str(": ");
            out.push_str(&header.value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out.push_str(&normalize_line_endings(&self.body));
        out
    }

    /// Unpadded base64url of [`to_rfc822`](Self::to_rfc822), as the send endpoint expects
    pub fn encode(&self) -> String {
        encode_base64url(self.to_rfc822().as_bytes())
    }
}

/// Build the outbound message for `request`
///
/// `original` holds the headers of the message being replied to, if any.
pub fn build_message(
    request: &OutboundMessageRequest,
    original: Option<&HeaderSet>,
) -> Result<OutboundMessage> {
    let to = match non_empty(Some(request.to.as_str())) {
        Some(to) => to.to_string(),
        None => original
            .and_then(|h| non_empty(h.get(names::FROM)))
            .map(str::to_string)
            .ok_or_else(|| MailError::compose("no recipient given"))?,
    };

    let subject = match (non_empty(request.subject.as_deref()), original) {
        (Some(subject), _) => subject.to_string(),
        (None, Some(original)) => derive_reply_subject(original.get_or(names::SUBJECT, NO_SUBJECT)),
        (None, None) => NO_SUBJECT.to_string(),
    };

    let mut headers = HeaderSet::new();
    headers.push(names::TO, sanitize(&to));
    headers.push(names::SUBJECT, encode_header_text(&sanitize(&subject)));
    headers.push(names::CONTENT_TYPE, CONTENT_TYPE_HTML);
    headers.push(names::MIME_VERSION, "1.0");

    let (in_reply_to, references) = threading_headers(request, original);
    if let Some(in_reply_to) = in_reply_to {
        headers.push(names::IN_REPLY_TO, sanitize(&in_reply_to));
    }
    if let Some(references) = references {
        headers.push(names::REFERENCES, sanitize(&references));
    }

    Ok(OutboundMessage {
        headers,
        body: request.body.clone(),
    })
}

/// `In-Reply-To` and `References` values for a request
///
/// The chain starts from the caller's `references_id`, else the original's
/// own `References`, and ends with the original's `Message-ID`.
fn threading_headers(
    request: &OutboundMessageRequest,
    original: Option<&HeaderSet>,
) -> (Option<String>, Option<String>) {
    let prior_chain = non_empty(request.references_id.as_deref())
        .or_else(|| original.and_then(|h| non_empty(h.get(names::REFERENCES))));

    let parent_id = original.and_then(|h| non_empty(h.get(names::MESSAGE_ID)));
    if original.is_some() && parent_id.is_none() {
        warn!("Original message has no Message-ID; reply will not be threaded by clients");
    }

    let references = match (prior_chain, parent_id) {
        (Some(chain), Some(parent)) if chain.split_whitespace().any(|id| id == parent) => {
            Some(chain.to_string())
        }
        (Some(chain), Some(parent)) => Some(format!("{} {}", chain, parent)),
        (Some(chain), None) => Some(chain.to_string()),
        (None, Some(parent)) => Some(parent.to_string()),
        (None, None) => None,
    };

    (parent_id.map(str::to_string), references)
}

/// Compose and send `request`
///
/// When replying, the original message's headers are fetched first. A
/// provider rejection of the send becomes [`MailError::Compose`].
pub fn send(
    api: &dyn MailApi,
    access_token: &str,
    request: &OutboundMessageRequest,
) -> Result<SentMessage> {
    let original = match &request.in_reply_to_id {
        Some(id) => {
            debug!("Fetching headers of {} for reply threading", id);
            Some(api.get_message_headers(access_token, id, &ORIGINAL_HEADERS)?)
        }
        None => None,
    };

    let message = build_message(request, original.as_ref())?;
    let response = api
        .send_raw_message(
            access_token,
            &message.encode(),
            request.conversation_id.as_ref(),
        )
        .map_err(|e| match e {
            MailError::Provider { message, .. } => MailError::compose(message),
            other => other,
        })?;

    info!("Sent message {}", response.id);
    Ok(SentMessage {
        message_id: MessageId::new(response.id),
        conversation_id: response
            .thread_id
            .map(ThreadId::new)
            .or_else(|| request.conversation_id.clone()),
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Fold line breaks so a value can't start a new header
fn sanitize(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// RFC 2047 encoded-words for non-ASCII header text
///
/// Long text is split on character boundaries into several words, folded
/// onto continuation lines.
fn encode_header_text(value: &str) -> String {
    if value.is_ascii() {
        return value.to_string();
    }

    let mut chunks: Vec<&str> = Vec::new();
    let mut start = 0;
    for (i, c) in value.char_indices() {
        if i + c.len_utf8() - start > ENCODED_WORD_BYTES {
            chunks.push(&value[start..i]);
            start = i;
        }
    }
    chunks.push(&value[start..]);

    chunks
        .into_iter()
        .map(|chunk| format!("=?UTF-8?B?{}?=", BASE64_STANDARD.encode(chunk.as_bytes())))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

fn normalize_line_endings(body: &str) -> String {
    body.replace("\r\n", "\n").replace('\n', "\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::decode_base64url;

    fn original(headers: &[(&str, &str)]) -> HeaderSet {
        headers.iter().copied().collect()
    }

    #[test]
    fn test_derive_reply_subject() {
        assert_eq!(derive_reply_subject("Hello"), "Re: Hello");
        assert_eq!(derive_reply_subject("Re: Hello"), "Re: Hello");
        assert_eq!(derive_reply_subject("Re:Hello"), "Re:Hello");
    }

    #[test]
    fn test_derive_reply_subject_is_case_sensitive() {
        assert_eq!(derive_reply_subject("RE: Hello"), "Re: RE: Hello");
        assert_eq!(derive_reply_subject("re: Hello"), "Re: re: Hello");
    }

    #[test]
    fn test_new_message_headers() {
        let request = OutboundMessageRequest::new("bob@example.com", "Hi", "<p>Hello</p>");
        let message = build_message(&request, None).unwrap();

        let names: Vec<&str> = message.headers().iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["To", "Subject", "Content-Type", "MIME-Version"]);
        assert_eq!(message.headers().get("Content-Type"), Some(CONTENT_TYPE_HTML));
        assert!(!message.headers().contains("In-Reply-To"));
        assert!(!message.headers().contains("References"));
    }

    #[test]
    fn test_to_rfc822_uses_crlf() {
        let request = OutboundMessageRequest::new("bob@example.com", "Hi", "line one\nline two");
        let raw = build_message(&request, None).unwrap().to_rfc822();

        assert_eq!(
            raw,
            "To: bob@example.com\r\n\
             Subject: Hi\r\n\
             Content-Type: text/html; charset=utf-8\r\n\
             MIME-Version: 1.0\r\n\
             \r\n\
             line one\r\nline two"
        );
    }

    #[test]
    fn test_reply_threading_headers() {
        let request = OutboundMessageRequest::reply(
            ThreadId::new("t1"),
            MessageId::new("m1"),
            "alice@example.com",
            "Thanks!",
        );
        let original = original(&[
            ("Message-ID", "<m1@mail.example.com>"),
            ("Subject", "Quarterly numbers"),
            ("From", "Alice <alice@example.com>"),
        ]);

        let message = build_message(&request, Some(&original)).unwrap();
        let headers = message.headers();
        assert_eq!(headers.get("In-Reply-To"), Some("<m1@mail.example.com>"));
        assert_eq!(headers.get("References"), Some("<m1@mail.example.com>"));
        assert_eq!(headers.get("Subject"), Some("Re: Quarterly numbers"));
    }

    #[test]
    fn test_reply_never_double_prefixes() {
        let request = OutboundMessageRequest::reply(
            ThreadId::new("t1"),
            MessageId::new("m2"),
            "alice@example.com",
            "Again",
        );
        let original = original(&[("Message-ID", "<m2@x>"), ("Subject", "Re: Quarterly numbers")]);

        let message = build_message(&request, Some(&original)).unwrap();
        assert_eq!(message.headers().get("Subject"), Some("Re: Quarterly numbers"));
    }

    #[test]
    fn test_explicit_subject_wins() {
        let mut request = OutboundMessageRequest::reply(
            ThreadId::new("t1"),
            MessageId::new("m1"),
            "alice@example.com",
            "Body",
        );
        request.subject = Some("Different topic".to_string());
        let original = original(&[("Message-ID", "<m1@x>"), ("Subject", "Old topic")]);

        let message = build_message(&request, Some(&original)).unwrap();
        assert_eq!(message.headers().get("Subject"), Some("Different topic"));
    }

    #[test]
    fn test_references_chain_extends_prior_chain() {
        let request = OutboundMessageRequest::reply(
            ThreadId::new("t1"),
            MessageId::new("m3"),
            "alice@example.com",
            "Body",
        );
        let original = original(&[
            ("Message-ID", "<m3@x>"),
            ("References", "<m1@x> <m2@x>"),
            ("Subject", "Re: Plans"),
        ]);

        let message = build_message(&request, Some(&original)).unwrap();
        assert_eq!(
            message.headers().get("References"),
            Some("<m1@x> <m2@x> <m3@x>")
        );
        assert_eq!(message.headers().get("In-Reply-To"), Some("<m3@x>"));
    }

    #[test]
    fn test_caller_references_take_precedence() {
        let mut request = OutboundMessageRequest::reply(
            ThreadId::new("t1"),
            MessageId::new("m2"),
            "alice@example.com",
            "Body",
        );
        request.references_id = Some("<root@x>".to_string());
        let original = original(&[("Message-ID", "<m2@x>"), ("References", "<other@x>")]);

        let message = build_message(&request, Some(&original)).unwrap();
        assert_eq!(message.headers().get("References"), Some("<root@x> <m2@x>"));
    }

    #[test]
    fn test_missing_message_id_skips_threading() {
        let request = OutboundMessageRequest::reply(
            ThreadId::new("t1"),
            MessageId::new("m1"),
            "alice@example.com",
            "Body",
        );
        let original = original(&[("Subject", "Hello")]);

        let message = build_message(&request, Some(&original)).unwrap();
        assert!(!message.headers().contains("In-Reply-To"));
        assert!(!message.headers().contains("References"));
        assert_eq!(message.headers().get("Subject"), Some("Re: Hello"));
    }

    #[test]
    fn test_empty_recipient_replies_to_original_sender() {
        let request = OutboundMessageRequest::reply(
            ThreadId::new("t1"),
            MessageId::new("m1"),
            "",
            "Body",
        );
        let original = original(&[("Message-ID", "<m1@x>"), ("From", "Alice <alice@example.com>")]);

        let message = build_message(&request, Some(&original)).unwrap();
        assert_eq!(message.headers().get("To"), Some("Alice <alice@example.com>"));
    }

    #[test]
    fn test_missing_recipient_is_compose_error() {
        let request = OutboundMessageRequest::new("  ", "Hi", "Body");
        let err = build_message(&request, None).unwrap_err();
        assert!(matches!(err, MailError::Compose { .. }));
    }

    #[test]
    fn test_header_injection_is_folded() {
        let request = OutboundMessageRequest::new(
            "bob@example.com",
            "Hi\r\nBcc: eve@example.com",
            "Body",
        );
        let raw = build_message(&request, None).unwrap().to_rfc822();
        assert!(raw.contains("Subject: Hi  Bcc: eve@example.com\r\n"));
        assert!(!raw.contains("\r\nBcc:"));
    }

    #[test]
    fn test_non_ascii_subject_is_encoded() {
        let request = OutboundMessageRequest::new("bob@example.com", "Café", "Body");
        let message = build_message(&request, None).unwrap();
        assert_eq!(message.headers().get("Subject"), Some("=?UTF-8?B?Q2Fmw6k=?="));
    }

    #[test]
    fn test_long_non_ascii_subject_is_split_into_words() {
        let subject = "é".repeat(40);
        let request = OutboundMessageRequest::new("bob@example.com", subject.clone(), "Body");
        let message = build_message(&request, None).unwrap();
        let encoded = message.headers().get("Subject").unwrap();

        let words: Vec<&str> = encoded.split("\r\n ").collect();
        assert_eq!(words.len(), 2);

        let mut decoded = Vec::new();
        for word in words {
            assert!(word.len() <= 75, "encoded word too long: {}", word);
            let payload = word
                .strip_prefix("=?UTF-8?B?")
                .and_then(|w| w.strip_suffix("?="))
                .unwrap();
            decoded.extend(BASE64_STANDARD.decode(payload).unwrap());
        }
        assert_eq!(String::from_utf8(decoded).unwrap(), subject);

        let raw = message.to_rfc822();
        assert!(raw.contains("\r\n =?UTF-8?B?"));
    }

    #[test]
    fn test_encode_is_unpadded_base64url_of_wire_form() {
        let request = OutboundMessageRequest::new("bob@example.com", "Hi", "<p>?</p>");
        let message = build_message(&request, None).unwrap();
        let encoded = message.encode();

        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert_eq!(decode_base64url(&encoded), message.to_rfc822());
    }
}
