//! Mailbox categories and the Gmail search queries behind them

use serde::{Deserialize, Serialize};
use std::fmt;

/// A fixed view of the mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Unread mail in the Primary tab
    #[default]
    UnreadPrimary,
    /// Unread mail outside the Primary tab
    NonPrimaryUnread,
    /// Everything in the Primary tab
    Primary,
    /// Promotions and Updates tabs
    Promotions,
    Updates,
    Sent,
    Drafts,
    /// The whole inbox
    All,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::UnreadPrimary,
        Category::NonPrimaryUnread,
        Category::Primary,
        Category::Promotions,
        Category::Updates,
        Category::Sent,
        Category::Drafts,
        Category::All,
    ];

    /// Gmail search query selecting this category
    pub fn query(self) -> &'static str {
        match self {
            Category::UnreadPrimary => "is:unread category:primary",
            Category::NonPrimaryUnread => "is:unread -category:primary",
            Category::Primary => "category:primary",
            Category::Promotions => "category:promotions OR category:updates",
            Category::Updates => "category:updates",
            Category::Sent => "is:sent",
            Category::Drafts => "is:draft",
            Category::All => "in:inbox",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::UnreadPrimary => "unread-primary",
            Category::NonPrimaryUnread => "non-primary-unread",
            Category::Primary => "primary",
            Category::Promotions => "promotions",
            Category::Updates => "updates",
            Category::Sent => "sent",
            Category::Drafts => "drafts",
            Category::All => "all",
        }
    }

    /// Look up a category by name, falling back to [`Category::UnreadPrimary`]
    ///
    /// Matching ignores case and accepts `_` in place of `-`.
    pub fn parse(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|c| c.name() == normalized)
            .unwrap_or_else(|| {
                log::debug!("Unknown category {:?}, using {}", name, Category::default());
                Category::default()
            })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
