//! Persisted run records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_types::{MetricCatalog, MetricDirection, RunId, SimulationResult};

/// Wall-clock duration of the run, in seconds.
pub const RUN_DURATION_METRIC: &str = "run.total_duration_secs";
/// Number of errors across all checks.
pub const RUN_ERROR_COUNT_METRIC: &str = "run.error_count";
/// Number of detected regressions.
pub const RUN_REGRESSION_COUNT_METRIC: &str = "run.regression_count";
/// Percentage of checks that passed.
pub const RUN_SUCCESS_RATE_METRIC: &str = "run.success_rate";

/// Run-level metrics every record carries, with their direction.
pub const RUN_METRICS: [(&str, MetricDirection); 4] = [
    (RUN_DURATION_METRIC, MetricDirection::HigherIsWorse),
    (RUN_ERROR_COUNT_METRIC, MetricDirection::HigherIsWorse),
    (RUN_REGRESSION_COUNT_METRIC, MetricDirection::HigherIsWorse),
    (RUN_SUCCESS_RATE_METRIC, MetricDirection::HigherIsBetter),
];

/// One completed run as stored in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Unique run identifier.
    pub id: RunId,

    /// When the run was recorded.
    pub recorded_at: DateTime<Utc>,

    /// Snapshot of the run result.
    pub result: SimulationResult,
}

impl HistoryRecord {
    /// Stamp a result with a fresh id and the current time.
    pub fn new(result: SimulationResult) -> Self {
        Self {
            id: RunId::new(),
            recorded_at: Utc::now(),
            result,
        }
    }

    /// Set the recording time.
    pub fn at(mut self, recorded_at: DateTime<Utc>) -> Self {
        self.recorded_at = recorded_at;
        self
    }

    /// Value of a built-in run metric.
    pub fn run_metric(&self, name: &str) -> Option<f64> {
        let result = &self.result;
        match name {
            RUN_DURATION_METRIC => Some(result.total_duration.as_secs_f64()),
            RUN_ERROR_COUNT_METRIC => Some(result.total_errors() as f64),
            RUN_REGRESSION_COUNT_METRIC => Some(result.regressions.len() as f64),
            RUN_SUCCESS_RATE_METRIC => Some(result.success_rate()),
            _ => None,
        }
    }

    /// Value of a registered check metric, taken from the first check (by
    /// name) that reports it.
    pub fn check_metric(&self, catalog: &MetricCatalog, name: &str) -> Option<f64> {
        if !catalog.contains(name) {
            return None;
        }
        self.result
            .check_results
            .values()
            .find_map(|r| r.numeric_metric(name))
    }

    /// Value of any metric: built-in first, then registered check metrics.
    pub fn metric(&self, catalog: &MetricCatalog, name: &str) -> Option<f64> {
        self.run_metric(name)
            .or_else(|| self.check_metric(catalog, name))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;
    use vigil_types::{CheckResult, CheckStatus, MetricSpec};

    #[test]
    fn test_run_metrics() {
        let mut results = BTreeMap::new();
        results.insert("a".to_string(), CheckResult::failure("a", "boom"));
        results.insert(
            "b".to_string(),
            CheckResult::success("b").with_metadata("bench.ms", 42.0),
        );
        let result = SimulationResult::new(
            CheckStatus::Failure,
            Duration::from_millis(2500),
            results,
            "",
        );
        let record = HistoryRecord::new(result);
        let catalog: MetricCatalog = [MetricSpec::higher_is_worse("bench.ms")]
            .into_iter()
            .collect();

        assert_eq!(record.run_metric(RUN_DURATION_METRIC), Some(2.5));
        assert_eq!(record.run_metric(RUN_ERROR_COUNT_METRIC), Some(1.0));
        assert_eq!(record.run_metric(RUN_SUCCESS_RATE_METRIC), Some(50.0));
        assert_eq!(record.metric(&catalog, "bench.ms"), Some(42.0));
        assert_eq!(record.metric(&MetricCatalog::new(), "bench.ms"), None);
    }
}
