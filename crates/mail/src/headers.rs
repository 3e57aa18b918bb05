//! Header lookup and address-list parsing
//!
//! [`HeaderSet`] is shared by inbound normalization and outbound composition.
//! Lookups are case-insensitive and the first matching header wins.

use serde::{Deserialize, Serialize};

use crate::models::EmailAddress;

/// Header names used by the synchronizer and composer
pub mod names {
    pub const FROM: &str = "From";
    pub const TO: &str = "To";
    pub const SUBJECT: &str = "Subject";
    pub const DATE: &str = "Date";
    pub const MESSAGE_ID: &str = "Message-ID";
    pub const IN_REPLY_TO: &str = "In-Reply-To";
    pub const REFERENCES: &str = "References";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const MIME_VERSION: &str = "MIME-Version";
}

/// Email header (name-value pair)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered header list with case-insensitive lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    headers: Vec<Header>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, keeping any existing ones with the same name
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push(Header::new(name, value));
    }

    /// Value of the first header named `name`, ignoring ASCII case
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Value of the first header named `name`, or `default` when absent or blank
    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        match self.get(name) {
            Some(value) if !value.trim().is_empty() => value,
            _ => default,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.headers.iter()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl From<Vec<Header>> for HeaderSet {
    fn from(headers: Vec<Header>) -> Self {
        Self { headers }
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HeaderSet {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            headers: iter.into_iter().map(|(n, v)| Header::new(n, v)).collect(),
        }
    }
}

/// Parse a comma-separated address list
///
/// Commas inside quoted display names or angle brackets do not split.
pub fn parse_address_list(s: &str) -> Vec<EmailAddress> {
    let mut addresses = Vec::new();
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' if !in_quotes && !in_angle => {
                push_address(&mut addresses, &s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    push_address(&mut addresses, &s[start..]);

    addresses
}

fn push_address(addresses: &mut Vec<EmailAddress>, raw: &str) {
    if !raw.trim().is_empty() {
        addresses.push(EmailAddress::parse(raw));
    }
}
