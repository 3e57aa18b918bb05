//! MIME body extraction
//!
//! Walks a message's part tree depth-first and picks one body to show:
//! an HTML child first, then a plain-text child, then whatever the nested
//! composites yield in the same order. Decoding never fails loudly; a
//! malformed part reads as empty so the rest of the conversation stays usable.

use base64::prelude::*;
use serde::{Deserialize, Serialize};

const RICH_TYPE: &str = "text/html";
const PLAIN_TYPE: &str = "text/plain";

/// A node in a message's MIME tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyPart {
    /// Part carrying content directly (base64url payload, if inline)
    Leaf {
        content_type: String,
        payload: Option<String>,
    },
    /// `multipart/*` container
    Composite {
        content_type: String,
        children: Vec<BodyPart>,
    },
}

impl BodyPart {
    pub fn leaf(content_type: impl Into<String>, payload: Option<String>) -> Self {
        Self::Leaf {
            content_type: content_type.into(),
            payload,
        }
    }

    pub fn composite(content_type: impl Into<String>, children: Vec<BodyPart>) -> Self {
        Self::Composite {
            content_type: content_type.into(),
            children,
        }
    }

    pub fn content_type(&self) -> &str {
        match self {
            Self::Leaf { content_type, .. } | Self::Composite { content_type, .. } => content_type,
        }
    }
}

/// The body chosen for display
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedBody {
    pub body: String,
    /// Whether `body` is HTML
    pub is_rich: bool,
}

/// Pick and decode the body of a message
///
/// Returns an empty plain body when nothing in the tree has content.
pub fn extract_body(root: &BodyPart) -> ExtractedBody {
    find_body(root).unwrap_or_default()
}

fn find_body(part: &BodyPart) -> Option<ExtractedBody> {
    match part {
        BodyPart::Leaf {
            content_type,
            payload,
        } => decode_leaf(payload.as_deref()).map(|body| ExtractedBody {
            body,
            is_rich: is_type(content_type, RICH_TYPE),
        }),
        BodyPart::Composite { children, .. } => find_leaf_of_type(children, RICH_TYPE)
            .or_else(|| find_leaf_of_type(children, PLAIN_TYPE))
            .or_else(|| {
                children
                    .iter()
                    .filter(|child| matches!(child, BodyPart::Composite { .. }))
                    .find_map(find_body)
            }),
    }
}

/// First direct leaf child of `mime_type` with non-empty content
fn find_leaf_of_type(children: &[BodyPart], mime_type: &str) -> Option<ExtractedBody> {
    children.iter().find_map(|child| match child {
        BodyPart::Leaf {
            content_type,
            payload,
        } if is_type(content_type, mime_type) => {
            decode_leaf(payload.as_deref()).map(|body| ExtractedBody {
                body,
                is_rich: mime_type == RICH_TYPE,
            })
        }
        _ => None,
    })
}

/// Decoded payload, or `None` when missing or empty after decoding
fn decode_leaf(payload: Option<&str>) -> Option<String> {
    payload
        .map(decode_base64url)
        .filter(|body| !body.is_empty())
}

/// Compare a declared content type against `mime_type`, ignoring case and parameters
fn is_type(content_type: &str, mime_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|t| t.trim().eq_ignore_ascii_case(mime_type))
}

/// Decode URL-safe base64 with or without padding into text
///
/// Malformed input yields an empty string. Invalid UTF-8 sequences are
/// replaced rather than rejected.
pub fn decode_base64url(data: &str) -> String {
    let mut standard: String = data
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    let trimmed_len = standard.trim_end_matches('=').len();
    standard.truncate(trimmed_len);
    while standard.len() % 4 != 0 {
        standard.push('=');
    }

    match BASE64_STANDARD.decode(standard.as_bytes()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            log::debug!("Discarding undecodable body part: {}", e);
            String::new()
        }
    }
}

/// Encode bytes as URL-safe base64 without padding
pub fn encode_base64url(data: &[u8]) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(data)
}
