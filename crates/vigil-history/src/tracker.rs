//! History tracker: the entry point for recording and analyzing runs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vigil_types::{MetricCatalog, SimulationResult};

use crate::baseline::Baseline;
use crate::error::{HistoryError, HistoryResult};
use crate::record::HistoryRecord;
use crate::store::HistoryStore;
use crate::suggestions;
use crate::trend::{self, TrendSummary};

/// Quality figures of a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySnapshot {
    pub total_checks: usize,
    pub success_rate: f64,
    pub failed_checks: usize,
    pub total_errors: usize,
    pub total_warnings: usize,
    pub regressions: usize,
    pub critical_regressions: usize,
}

/// Records runs in a [`HistoryStore`] and analyzes them.
#[derive(Clone)]
pub struct HistoryTracker {
    store: Arc<dyn HistoryStore>,
    catalog: MetricCatalog,
}

impl HistoryTracker {
    /// Create a tracker over a store. `catalog` decides which check metrics
    /// are promoted into baselines and analyzed for trends.
    pub fn new(store: Arc<dyn HistoryStore>, catalog: MetricCatalog) -> Self {
        Self { store, catalog }
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    /// Append a run to history.
    pub async fn record(&self, result: &SimulationResult) -> HistoryResult<HistoryRecord> {
        let record = HistoryRecord::new(result.clone());
        self.store.append(&record).await?;
        tracing::info!(
            run_id = %record.id,
            status = %record.result.overall_status,
            "recorded run"
        );
        Ok(record)
    }

    /// The most recent `limit` runs (all when `None`), oldest first.
    pub async fn history(&self, limit: Option<usize>) -> HistoryResult<Vec<HistoryRecord>> {
        self.store.read(limit).await
    }

    /// Trends over the most recent `window` runs.
    pub async fn trend(&self, window: usize) -> HistoryResult<TrendSummary> {
        if window == 0 {
            return Err(HistoryError::InvalidWindow(window));
        }
        let records = self.store.read(Some(window)).await?;
        Ok(trend::analyze(&records, &self.catalog))
    }

    /// The current baseline.
    pub async fn baseline(&self) -> HistoryResult<Baseline> {
        self.store.baseline().await
    }

    /// Make the record's registered metrics the new baseline values.
    pub async fn promote(&self, record: &HistoryRecord) -> HistoryResult<Baseline> {
        let next = self.store.baseline().await?.promoted(record, &self.catalog);
        self.store.promote(&next).await?;
        tracing::info!(run_id = %record.id, metrics = next.len(), "promoted run to baseline");
        Ok(next)
    }

    /// Improvement suggestions from the most recent `window` runs.
    pub async fn suggestions(&self, window: usize) -> HistoryResult<Vec<String>> {
        if window == 0 {
            return Err(HistoryError::InvalidWindow(window));
        }
        let records = self.store.read(Some(window)).await?;
        let trends = trend::analyze(&records, &self.catalog);
        Ok(suggestions::suggest(&records, trends.report()))
    }

    /// Quality figures of one run.
    pub fn quality_snapshot(result: &SimulationResult) -> QualitySnapshot {
        QualitySnapshot {
            total_checks: result.check_results.len(),
            success_rate: result.success_rate(),
            failed_checks: result.failed_checks().len(),
            total_errors: result.total_errors(),
            total_warnings: result.total_warnings(),
            regressions: result.regressions.len(),
            critical_regressions: result.critical_regressions(),
        }
    }
}

impl std::fmt::Debug for HistoryTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryTracker")
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}
