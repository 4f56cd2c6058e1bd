//! Aggregated run results.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::regression::{RegressionIssue, Severity};
use crate::result::{CheckResult, CheckStatus};

/// Unique identifier for a recorded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Create a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a run ID from a string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of checks per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub success: usize,
    pub failure: usize,
    pub warning: usize,
    pub skipped: usize,
    pub timeout: usize,
}

impl StatusCounts {
    /// Count one status.
    pub fn add(&mut self, status: CheckStatus) {
        match status {
            CheckStatus::Success => self.success += 1,
            CheckStatus::Failure => self.failure += 1,
            CheckStatus::Warning => self.warning += 1,
            CheckStatus::Skipped => self.skipped += 1,
            CheckStatus::Timeout => self.timeout += 1,
        }
    }

    /// Total number of counted statuses.
    pub fn total(&self) -> usize {
        self.success + self.failure + self.warning + self.skipped + self.timeout
    }
}

impl FromIterator<CheckStatus> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = CheckStatus>>(iter: I) -> Self {
        let mut counts = StatusCounts::default();
        for status in iter {
            counts.add(status);
        }
        counts
    }
}

/// Outcome of a complete run, handed to report renderers.
///
/// The value is built once by the aggregator. Later stages produce annotated
/// copies through [`SimulationResult::with_regressions`] and
/// [`SimulationResult::with_warning`]; nothing mutates a result in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Worst status among all check results.
    pub overall_status: CheckStatus,

    /// Wall-clock time from plan start to the end of the last batch.
    pub total_duration: Duration,

    /// Result per check name.
    pub check_results: BTreeMap<String, CheckResult>,

    /// Regressions detected against the baseline.
    #[serde(default)]
    pub regressions: Vec<RegressionIssue>,

    /// One-line summary.
    #[serde(default)]
    pub summary: String,

    /// Engine-level warnings, e.g. history persistence failures.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl SimulationResult {
    /// Create a result without regressions or warnings.
    pub fn new(
        overall_status: CheckStatus,
        total_duration: Duration,
        check_results: BTreeMap<String, CheckResult>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            overall_status,
            total_duration,
            check_results,
            regressions: Vec::new(),
            summary: summary.into(),
            warnings: Vec::new(),
        }
    }

    /// Copy of this result annotated with regressions.
    pub fn with_regressions(mut self, regressions: Vec<RegressionIssue>) -> Self {
        self.regressions = regressions;
        self
    }

    /// Copy of this result with an additional engine warning.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Whether the run passed overall (SUCCESS or WARNING).
    pub fn is_successful(&self) -> bool {
        self.overall_status.is_successful()
    }

    /// Checks that finished with FAILURE or TIMEOUT.
    pub fn failed_checks(&self) -> Vec<&CheckResult> {
        self.check_results
            .values()
            .filter(|r| r.status.is_blocking())
            .collect()
    }

    /// Checks that finished with SUCCESS or WARNING.
    pub fn successful_checks(&self) -> Vec<&CheckResult> {
        self.check_results
            .values()
            .filter(|r| r.is_successful())
            .collect()
    }

    /// Checks with the given status.
    pub fn checks_with_status(&self, status: CheckStatus) -> Vec<&CheckResult> {
        self.check_results
            .values()
            .filter(|r| r.status == status)
            .collect()
    }

    /// Number of checks per status.
    pub fn status_counts(&self) -> StatusCounts {
        self.check_results.values().map(|r| r.status).collect()
    }

    /// Percentage of checks that passed, 0 when no check ran.
    pub fn success_rate(&self) -> f64 {
        if self.check_results.is_empty() {
            return 0.0;
        }
        self.successful_checks().len() as f64 / self.check_results.len() as f64 * 100.0
    }

    /// Total number of errors across all checks.
    pub fn total_errors(&self) -> usize {
        self.check_results.values().map(|r| r.errors.len()).sum()
    }

    /// Total number of warnings across all checks.
    pub fn total_warnings(&self) -> usize {
        self.check_results.values().map(|r| r.warnings.len()).sum()
    }

    /// Number of critical regressions.
    pub fn critical_regressions(&self) -> usize {
        self.regressions
            .iter()
            .filter(|r| r.severity == Severity::Critical)
            .count()
    }
}
