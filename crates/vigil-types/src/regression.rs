//! Regression issues.

use serde::{Deserialize, Serialize};

/// Severity of a regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Just above the threshold.
    Low,
    /// Up to twice the threshold.
    Medium,
    /// Up to three times the threshold.
    High,
    /// More than three times the threshold.
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// A metric that worsened beyond the configured threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionIssue {
    /// Metric key.
    pub metric_name: String,

    /// Check whose result reported the metric.
    pub check_name: String,

    /// Baseline value.
    pub baseline_value: f64,

    /// Value observed in this run.
    pub current_value: f64,

    /// Worsening relative to the baseline, in percent. Always positive.
    pub regression_percentage: f64,

    /// Severity band.
    pub severity: Severity,

    /// Human-readable description.
    pub description: String,
}

impl RegressionIssue {
    /// Whether this issue should fail a run on its own.
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}
