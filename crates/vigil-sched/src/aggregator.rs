//! Result aggregation.

use std::collections::BTreeMap;
use std::time::Duration;

use vigil_types::{CheckResult, CheckStatus, SimulationResult, StatusCounts};

/// Folds per-check results into a [`SimulationResult`].
///
/// Aggregation is pure: the same input always yields an equal value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Build the run result. The overall status is the worst check status.
    pub fn aggregate(
        &self,
        results: &BTreeMap<String, CheckResult>,
        total_duration: Duration,
    ) -> SimulationResult {
        let overall = CheckStatus::worst(results.values().map(|r| r.status));
        let counts: StatusCounts = results.values().map(|r| r.status).collect();
        let summary = Self::summary_line(&counts);

        tracing::debug!(
            checks = counts.total(),
            overall = %overall,
            "aggregated check results"
        );
        SimulationResult::new(overall, total_duration, results.clone(), summary)
    }

    /// One-line summary, e.g. `Executed 3 checks: ✓ 1 successful | ✗ 1 failed`.
    pub fn summary_line(counts: &StatusCounts) -> String {
        if counts.total() == 0 {
            return "No checks were executed.".to_string();
        }

        let mut parts = vec![format!("✓ {} successful", counts.success)];
        if counts.failure > 0 {
            parts.push(format!("✗ {} failed", counts.failure));
        }
        if counts.timeout > 0 {
            parts.push(format!("⏱ {} timed out", counts.timeout));
        }
        if counts.warning > 0 {
            parts.push(format!("⚠ {} warnings", counts.warning));
        }
        if counts.skipped > 0 {
            parts.push(format!("- {} skipped", counts.skipped));
        }
        format!("Executed {} checks: {}", counts.total(), parts.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(statuses: &[(&str, CheckStatus)]) -> BTreeMap<String, CheckResult> {
        statuses
            .iter()
            .map(|(name, status)| (name.to_string(), CheckResult::new(*name, *status)))
            .collect()
    }

    #[test]
    fn test_failure_dominates() {
        let input = results(&[
            ("a", CheckStatus::Failure),
            ("b", CheckStatus::Warning),
            ("c", CheckStatus::Success),
        ]);
        let result = ResultAggregator::new().aggregate(&input, Duration::from_secs(1));
        assert_eq!(result.overall_status, CheckStatus::Failure);
        assert_eq!(
            result.summary,
            "Executed 3 checks: ✓ 1 successful | ✗ 1 failed | ⚠ 1 warnings"
        );
    }

    #[test]
    fn test_warning_over_success() {
        let input = results(&[("a", CheckStatus::Warning), ("b", CheckStatus::Success)]);
        let result = ResultAggregator::new().aggregate(&input, Duration::ZERO);
        assert_eq!(result.overall_status, CheckStatus::Warning);
        assert!(result.is_successful());
    }

    #[test]
    fn test_timeout_below_failure() {
        let input = results(&[("a", CheckStatus::Timeout), ("b", CheckStatus::Success)]);
        let result = ResultAggregator::new().aggregate(&input, Duration::ZERO);
        assert_eq!(result.overall_status, CheckStatus::Timeout);
        assert!(result.summary.contains("⏱ 1 timed out"));
    }

    #[test]
    fn test_all_skipped_and_empty() {
        let aggregator = ResultAggregator::new();
        let skipped = results(&[("a", CheckStatus::Skipped), ("b", CheckStatus::Skipped)]);
        assert_eq!(
            aggregator.aggregate(&skipped, Duration::ZERO).overall_status,
            CheckStatus::Skipped
        );

        let empty = aggregator.aggregate(&BTreeMap::new(), Duration::ZERO);
        assert_eq!(empty.overall_status, CheckStatus::Skipped);
        assert_eq!(empty.summary, "No checks were executed.");
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let input = results(&[
            ("lint", CheckStatus::Success),
            ("test", CheckStatus::Failure),
            ("bench", CheckStatus::Skipped),
        ]);
        let aggregator = ResultAggregator::new();
        let first = aggregator.aggregate(&input, Duration::from_millis(750));
        let second = aggregator.aggregate(&input, Duration::from_millis(750));
        assert_eq!(first, second);
    }
}
