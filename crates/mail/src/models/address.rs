//! Email address parsing and display helpers

use serde::{Deserialize, Serialize};

/// An email address with optional display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name as written in the header (e.g., "John Doe")
    pub name: Option<String>,
    /// Email address (e.g., "john@example.com")
    pub email: String,
}

impl EmailAddress {
    /// Create a new email address with just the email
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// Create a new email address with a display name
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: email.into(),
        }
    }

    /// Parse an address string
    ///
    /// Accepts `"John Doe" <john@example.com>`, `John Doe <john@example.com>`,
    /// `<john@example.com>` and a bare `john@example.com`.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        if let Some(angle_start) = s.rfind('<')
            && let Some(angle_end) = s.rfind('>')
            && angle_start < angle_end
        {
            let name = unquote(s[..angle_start].trim());
            let email = s[angle_start + 1..angle_end].trim();
            return Self {
                name: if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                },
                email: email.to_string(),
            };
        }

        Self::new(s)
    }

    /// The name to show for this address
    ///
    /// Uses the parsed display name when present, otherwise humanizes the
    /// local-part (`jane.doe@x` becomes `Jane Doe`).
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => humanize_local_part(&self.email),
        }
    }

    /// Avatar initials derived from [`display_name`](Self::display_name)
    pub fn initials(&self) -> String {
        initials(&self.display_name())
    }

    /// Format the address as a header value
    pub fn display(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
        .trim()
}

/// Turn the local-part of an address into a readable name
///
/// `.`, `_` and `-` separate words; each word is title-cased.
pub fn humanize_local_part(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    local
        .split(['.', '_', '-'])
        .filter(|word| !word.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Initials for a display name
///
/// First letters of the first and last words; a single word yields its
/// first two characters.
pub fn initials(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let raw: String = match words.as_slice() {
        [] => return "?".to_string(),
        [only] => only.chars().take(2).collect(),
        [first, .., last] => first
            .chars()
            .take(1)
            .chain(last.chars().take(1))
            .collect(),
    };
    raw.to_uppercase()
}
