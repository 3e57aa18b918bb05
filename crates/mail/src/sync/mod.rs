//! Thread synchronization
//!
//! Pull-based: every call fetches fresh data from the provider.

mod category;
mod threads;

pub use category::Category;
pub use threads::{FailedFetch, SummaryBatch, ThreadSynchronizer};
