//! Metric baselines.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_types::{CheckResult, MetricCatalog, RunId};

use crate::record::HistoryRecord;

/// Reference value of one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineEntry {
    pub value: f64,
    /// Run the value was promoted from.
    pub run_id: RunId,
    pub captured_at: DateTime<Utc>,
}

/// Reference values that new runs are compared against.
///
/// A baseline only changes through explicit promotion of a recorded run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    entries: BTreeMap<String, BaselineEntry>,
}

impl Baseline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, metric: &str) -> Option<&BaselineEntry> {
        self.entries.get(metric)
    }

    /// Baseline value of a metric.
    pub fn value(&self, metric: &str) -> Option<f64> {
        self.entries.get(metric).map(|e| e.value)
    }

    pub fn contains(&self, metric: &str) -> bool {
        self.entries.contains_key(metric)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BaselineEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set one entry. Used by stores when loading.
    pub fn insert(&mut self, metric: impl Into<String>, entry: BaselineEntry) {
        self.entries.insert(metric.into(), entry);
    }

    /// Copy of this baseline updated with the record's registered metrics.
    ///
    /// Metrics the record does not report keep their previous entry.
    pub fn promoted(&self, record: &HistoryRecord, catalog: &MetricCatalog) -> Baseline {
        let mut next = self.clone();
        for observation in observe(catalog, record.result.check_results.values()) {
            // First check in name order wins when several report a metric.
            if next
                .entries
                .get(&observation.metric_name)
                .is_some_and(|e| e.run_id == record.id)
            {
                continue;
            }
            next.entries.insert(
                observation.metric_name,
                BaselineEntry {
                    value: observation.value,
                    run_id: record.id,
                    captured_at: record.recorded_at,
                },
            );
        }
        next
    }
}

/// A registered numeric metric reported by a check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricObservation {
    pub check_name: String,
    pub metric_name: String,
    pub value: f64,
}

/// Registered numeric metrics reported by `results`, in result then key order.
pub fn observe<'a>(
    catalog: &MetricCatalog,
    results: impl IntoIterator<Item = &'a CheckResult>,
) -> Vec<MetricObservation> {
    let mut observations = Vec::new();
    for result in results {
        for key in result.metadata.keys() {
            if !catalog.contains(key) {
                continue;
            }
            if let Some(value) = result.numeric_metric(key) {
                observations.push(MetricObservation {
                    check_name: result.name.clone(),
                    metric_name: key.clone(),
                    value,
                });
            }
        }
    }
    observations
}
