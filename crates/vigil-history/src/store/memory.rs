//! In-memory history store for tests and ephemeral runs.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::baseline::Baseline;
use crate::error::HistoryResult;
use crate::record::HistoryRecord;
use crate::store::{HistoryStore, keep_last};

/// History store that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<HistoryRecord>>,
    baseline: RwLock<Baseline>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append(&self, record: &HistoryRecord) -> HistoryResult<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn read(&self, limit: Option<usize>) -> HistoryResult<Vec<HistoryRecord>> {
        let records = self.records.read().await.clone();
        Ok(keep_last(records, limit))
    }

    async fn baseline(&self) -> HistoryResult<Baseline> {
        Ok(self.baseline.read().await.clone())
    }

    async fn promote(&self, baseline: &Baseline) -> HistoryResult<()> {
        *self.baseline.write().await = baseline.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;
    use vigil_types::{CheckStatus, SimulationResult};

    fn record(summary: &str) -> HistoryRecord {
        HistoryRecord::new(SimulationResult::new(
            CheckStatus::Success,
            Duration::from_secs(1),
            BTreeMap::new(),
            summary,
        ))
    }

    #[tokio::test]
    async fn test_memory_store_read_limit() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.append(&record(&format!("run {i}"))).await.unwrap();
        }

        assert_eq!(store.len().await, 5);
        let last_two = store.read(Some(2)).await.unwrap();
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].result.summary, "run 3");
        assert_eq!(last_two[1].result.summary, "run 4");
        assert_eq!(store.read(None).await.unwrap().len(), 5);
    }
}
