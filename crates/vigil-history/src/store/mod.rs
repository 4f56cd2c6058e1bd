//! Persistence layer for run history and baselines.

mod jsonl;
mod memory;
mod sqlite;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::baseline::Baseline;
use crate::error::HistoryResult;
use crate::record::HistoryRecord;

/// Trait for append-only run history storage.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one record. A record is either fully stored or not at all.
    async fn append(&self, record: &HistoryRecord) -> HistoryResult<()>;

    /// The most recent `limit` records (all when `None`), oldest first.
    async fn read(&self, limit: Option<usize>) -> HistoryResult<Vec<HistoryRecord>>;

    /// Load the current baseline. Empty if none has been promoted.
    async fn baseline(&self) -> HistoryResult<Baseline>;

    /// Replace the stored baseline.
    async fn promote(&self, baseline: &Baseline) -> HistoryResult<()>;
}

/// Keep only the last `limit` elements.
pub(crate) fn keep_last<T>(mut items: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit {
        if items.len() > limit {
            items.drain(..items.len() - limit);
        }
    }
    items
}
