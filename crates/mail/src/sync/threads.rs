//! Conversation listing and detail fetch

use log::{debug, info, warn};
use rayon::prelude::*;
use std::sync::Arc;

use super::Category;
use crate::error::{MailError, Result};
use crate::gmail::{MailApi, normalize_message, summarize_thread};
use crate::headers::names;
use crate::models::{ConversationDetail, ConversationSummary, ThreadId};

/// Headers requested for each conversation while listing
const SUMMARY_HEADERS: [&str; 4] = [names::FROM, names::TO, names::SUBJECT, names::DATE];

/// A conversation whose metadata could not be fetched
#[derive(Debug, Clone, PartialEq)]
pub struct FailedFetch {
    pub thread_id: ThreadId,
    pub error: MailError,
}

/// Result of listing summaries
///
/// Failed conversations are left out of `summaries` and reported in `failures`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryBatch {
    /// Summaries in the order the provider listed them
    pub summaries: Vec<ConversationSummary>,
    pub failures: Vec<FailedFetch>,
}

/// Fetches conversations from the provider and normalizes them
pub struct ThreadSynchronizer {
    api: Arc<dyn MailApi>,
    pool: rayon::ThreadPool,
}

impl ThreadSynchronizer {
    /// Create a synchronizer fetching at most `concurrency` conversations at once
    pub fn new(api: Arc<dyn MailApi>, concurrency: usize) -> anyhow::Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency.max(1))
            .thread_name(|i| format!("mail-fetch-{}", i))
            .build()?;
        Ok(Self { api, pool })
    }

    /// List summaries for `category`, newest first as ordered by the provider
    ///
    /// A conversation whose metadata fetch fails is dropped and reported in
    /// [`SummaryBatch::failures`]. If every fetch fails, the first error is
    /// returned instead.
    pub fn list_summaries(
        &self,
        access_token: &str,
        max_results: usize,
        category: Category,
    ) -> Result<SummaryBatch> {
        let ids = self
            .api
            .list_thread_ids(access_token, category.query(), max_results)?;
        let total = ids.len();
        if total == 0 {
            return Ok(SummaryBatch::default());
        }

        let results: Vec<(ThreadId, Result<Option<ConversationSummary>>)> = self.pool.install(|| {
            ids.into_par_iter()
                .map(|id| {
                    let summary = self
                        .api
                        .get_thread_metadata(access_token, &id, &SUMMARY_HEADERS)
                        .map(|thread| summarize_thread(&thread));
                    (id, summary)
                })
                .collect()
        });

        let mut batch = SummaryBatch::default();
        for (thread_id, result) in results {
            match result {
                Ok(Some(summary)) => batch.summaries.push(summary),
                Ok(None) => debug!("Skipping thread {} with no messages", thread_id),
                Err(error) => {
                    warn!("Failed to fetch thread {}: {}", thread_id, error);
                    batch.failures.push(FailedFetch { thread_id, error });
                }
            }
        }

        // Nothing succeeded: surface the cause rather than an empty mailbox
        if batch.failures.len() == total {
            return Err(batch.failures.remove(0).error);
        }

        info!(
            "Listed {} {} conversations ({} failed)",
            batch.summaries.len(),
            category,
            batch.failures.len()
        );
        Ok(batch)
    }

    /// Fetch a conversation with all message bodies decoded
    ///
    /// Returns `None` when the conversation has no messages.
    pub fn get_detail(&self, access_token: &str, id: &ThreadId) -> Result<Option<ConversationDetail>> {
        let thread = self.api.get_thread_full(access_token, id)?;

        let Some(summary) = summarize_thread(&thread) else {
            debug!("Thread {} has no messages", id);
            return Ok(None);
        };

        let messages = thread
            .messages
            .iter()
            .flatten()
            .map(normalize_message)
            .collect();

        Ok(Some(ConversationDetail { summary, messages }))
    }
}
