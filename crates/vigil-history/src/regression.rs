//! Regression detection against a baseline.
//!
//! Only metrics registered in the [`MetricCatalog`] are compared, and the
//! catalog decides which direction counts as worse. The worsening is always
//! expressed as a positive percentage of the baseline value:
//!
//! ```text
//! higher is worse:  (current - baseline) / baseline * 100
//! higher is better: (baseline - current) / baseline * 100
//! ```
//!
//! A metric regresses when that percentage is strictly above the threshold.
//! Severity bands are multiples of the threshold with inclusive upper edges.

use std::collections::BTreeMap;

use vigil_types::{CheckResult, MetricCatalog, MetricDirection, RegressionIssue, Severity};

use crate::baseline::{Baseline, MetricObservation, observe};

/// Default regression threshold, in percent.
pub const DEFAULT_THRESHOLD: f64 = 30.0;

/// Severity of a worsening of `percentage` against `threshold`.
pub fn severity_for(percentage: f64, threshold: f64) -> Severity {
    if percentage <= threshold * 1.5 {
        Severity::Low
    } else if percentage <= threshold * 2.0 {
        Severity::Medium
    } else if percentage <= threshold * 3.0 {
        Severity::High
    } else {
        Severity::Critical
    }
}

/// Worsening of `current` relative to `baseline`, in percent.
///
/// Returns `None` for a zero baseline, where no percentage exists.
pub fn worsening_percentage(direction: MetricDirection, baseline: f64, current: f64) -> Option<f64> {
    if baseline == 0.0 {
        return None;
    }
    let delta = match direction {
        MetricDirection::HigherIsWorse => current - baseline,
        MetricDirection::HigherIsBetter => baseline - current,
    };
    Some(delta * 100.0 / baseline.abs())
}

/// Compares check metrics against a baseline.
#[derive(Debug, Clone)]
pub struct RegressionDetector {
    catalog: MetricCatalog,
    threshold: f64,
}

impl RegressionDetector {
    /// Create a detector with the default threshold.
    pub fn new(catalog: MetricCatalog) -> Self {
        Self {
            catalog,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Set the threshold, in percent.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    /// Regressions in `results`, sorted by check name then metric name.
    pub fn detect(
        &self,
        results: &BTreeMap<String, CheckResult>,
        baseline: &Baseline,
    ) -> Vec<RegressionIssue> {
        let mut issues = Vec::new();

        for observation in observe(&self.catalog, results.values()) {
            let Some(baseline_value) = baseline.value(&observation.metric_name) else {
                continue;
            };
            let Some(direction) = self.catalog.direction(&observation.metric_name) else {
                continue;
            };
            let Some(percentage) =
                worsening_percentage(direction, baseline_value, observation.value)
            else {
                tracing::debug!(metric = %observation.metric_name, "zero baseline, skipping");
                continue;
            };
            if percentage <= self.threshold {
                continue;
            }

            let severity = severity_for(percentage, self.threshold);
            issues.push(RegressionIssue {
                description: format!(
                    "{} in '{}' worsened by {:.1}% ({} -> {})",
                    observation.metric_name,
                    observation.check_name,
                    percentage,
                    baseline_value,
                    observation.value
                ),
                metric_name: observation.metric_name,
                check_name: observation.check_name,
                baseline_value,
                current_value: observation.value,
                regression_percentage: percentage,
                severity,
            });
        }

        issues.sort_by(|a, b| {
            a.check_name
                .cmp(&b.check_name)
                .then_with(|| a.metric_name.cmp(&b.metric_name))
        });
        if !issues.is_empty() {
            tracing::info!(count = issues.len(), "detected regressions");
        }
        issues
    }

    /// Registered metrics in `results` that have no baseline entry yet.
    pub fn baseline_candidates(
        &self,
        results: &BTreeMap<String, CheckResult>,
        baseline: &Baseline,
    ) -> Vec<MetricObservation> {
        observe(&self.catalog, results.values())
            .into_iter()
            .filter(|o| !baseline.contains(&o.metric_name))
            .collect()
    }
}
