//! Trend analysis over recent runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_types::{MetricCatalog, MetricDirection, StatusCounts};

use crate::record::{HistoryRecord, RUN_METRICS};

/// Relative slope below which a series counts as flat.
pub const FLAT_TOLERANCE: f64 = 0.01;

/// Direction of a metric over the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Flat,
    Degrading,
}

/// Trend of one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTrend {
    pub metric: String,
    pub direction: TrendDirection,
    /// Least-squares slope per run.
    pub slope: f64,
    pub mean: f64,
    pub latest: f64,
    /// Runs in the window that reported the metric.
    pub samples: usize,
}

/// Aggregate view of a window of runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    /// Runs in the window.
    pub runs: usize,
    /// Overall run statuses.
    pub status_counts: StatusCounts,
    /// Percentage of runs that passed. WARNING runs count as passed and
    /// SKIPPED runs count as neither passed nor failed.
    pub success_rate: f64,
    /// Percentage of runs that failed or timed out.
    pub failure_rate: f64,
    pub first_recorded: DateTime<Utc>,
    pub last_recorded: DateTime<Utc>,
    /// Per-metric trends: run metrics first, then registered metrics by name.
    pub metrics: Vec<MetricTrend>,
}

impl TrendReport {
    /// Trend of one metric.
    pub fn metric(&self, name: &str) -> Option<&MetricTrend> {
        self.metrics.iter().find(|m| m.metric == name)
    }

    /// Metrics that are getting worse.
    pub fn degrading(&self) -> impl Iterator<Item = &MetricTrend> {
        self.metrics
            .iter()
            .filter(|m| m.direction == TrendDirection::Degrading)
    }
}

/// Outcome of a trend query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrendSummary {
    /// Fewer than two runs in history.
    InsufficientData { runs: usize },
    /// Enough runs to compute trends.
    Report(TrendReport),
}

impl TrendSummary {
    pub fn report(&self) -> Option<&TrendReport> {
        match self {
            TrendSummary::Report(report) => Some(report),
            TrendSummary::InsufficientData { .. } => None,
        }
    }
}

/// Least-squares slope of `values` against their index.
pub fn slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = values.iter().sum::<f64>() / n as f64;

    let (numerator, denominator) =
        values
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(num, den), (i, y)| {
                let dx = i as f64 - x_mean;
                (num + dx * (y - y_mean), den + dx * dx)
            });
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Interpret a slope with the metric's direction.
pub fn classify(slope: f64, mean: f64, direction: MetricDirection) -> TrendDirection {
    if slope == 0.0 || slope.abs() < FLAT_TOLERANCE * mean.abs() {
        return TrendDirection::Flat;
    }
    let rising = slope > 0.0;
    match (direction, rising) {
        (MetricDirection::HigherIsWorse, true) | (MetricDirection::HigherIsBetter, false) => {
            TrendDirection::Degrading
        }
        _ => TrendDirection::Improving,
    }
}

fn metric_trend(name: &str, direction: MetricDirection, values: &[f64]) -> Option<MetricTrend> {
    let latest = *values.last()?;
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let slope = slope(values);
    Some(MetricTrend {
        metric: name.to_string(),
        direction: classify(slope, mean, direction),
        slope,
        mean,
        latest,
        samples: values.len(),
    })
}

/// Analyze records, oldest first.
pub fn analyze(records: &[HistoryRecord], catalog: &MetricCatalog) -> TrendSummary {
    let (Some(first), Some(last)) = (records.first(), records.last()) else {
        return TrendSummary::InsufficientData { runs: 0 };
    };
    if records.len() < 2 {
        return TrendSummary::InsufficientData {
            runs: records.len(),
        };
    }

    let runs = records.len();
    let status_counts: StatusCounts = records.iter().map(|r| r.result.overall_status).collect();
    let passed = status_counts.success + status_counts.warning;
    let failed = status_counts.failure + status_counts.timeout;

    let mut metrics = Vec::new();
    for (name, direction) in RUN_METRICS {
        let values: Vec<f64> = records.iter().filter_map(|r| r.run_metric(name)).collect();
        metrics.extend(metric_trend(name, direction, &values));
    }
    for (name, direction) in catalog.iter() {
        let values: Vec<f64> = records
            .iter()
            .filter_map(|r| r.check_metric(catalog, name))
            .collect();
        metrics.extend(metric_trend(name, direction, &values));
    }

    TrendSummary::Report(TrendReport {
        runs,
        status_counts,
        success_rate: passed as f64 / runs as f64 * 100.0,
        failure_rate: failed as f64 / runs as f64 * 100.0,
        first_recorded: first.recorded_at,
        last_recorded: last.recorded_at,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;
    use crate::record::{RUN_DURATION_METRIC, RUN_SUCCESS_RATE_METRIC};
    use vigil_types::{CheckResult, CheckStatus, MetricSpec, SimulationResult};

    fn run(status: CheckStatus, secs: u64, startup_ms: f64) -> HistoryRecord {
        let mut results = BTreeMap::new();
        results.insert(
            "bench".to_string(),
            CheckResult::new("bench", status).with_metadata("bench.startup_ms", startup_ms),
        );
        HistoryRecord::new(SimulationResult::new(
            status,
            Duration::from_secs(secs),
            results,
            "",
        ))
    }

    #[test]
    fn test_slope() {
        assert_eq!(slope(&[1.0, 2.0, 3.0, 4.0]), 1.0);
        assert_eq!(slope(&[5.0, 5.0, 5.0]), 0.0);
        assert_eq!(slope(&[4.0, 2.0]), -2.0);
        assert_eq!(slope(&[7.0]), 0.0);
    }

    #[test]
    fn test_classify() {
        use MetricDirection::*;
        assert_eq!(classify(2.0, 100.0, HigherIsWorse), TrendDirection::Degrading);
        assert_eq!(classify(2.0, 100.0, HigherIsBetter), TrendDirection::Improving);
        assert_eq!(classify(-2.0, 100.0, HigherIsBetter), TrendDirection::Degrading);
        // Below 1% of the mean.
        assert_eq!(classify(0.5, 100.0, HigherIsWorse), TrendDirection::Flat);
        assert_eq!(classify(0.0, 0.0, HigherIsWorse), TrendDirection::Flat);
    }

    #[test]
    fn test_insufficient_data() {
        let catalog = MetricCatalog::new();
        assert_eq!(
            analyze(&[], &catalog),
            TrendSummary::InsufficientData { runs: 0 }
        );
        let one = [run(CheckStatus::Success, 1, 10.0)];
        assert_eq!(
            analyze(&one, &catalog),
            TrendSummary::InsufficientData { runs: 1 }
        );
    }

    #[test]
    fn test_report() {
        let catalog: MetricCatalog = [MetricSpec::higher_is_worse("bench.startup_ms")]
            .into_iter()
            .collect();
        let records = vec![
            run(CheckStatus::Success, 10, 100.0),
            run(CheckStatus::Failure, 20, 120.0),
            run(CheckStatus::Warning, 30, 140.0),
            run(CheckStatus::Success, 40, 160.0),
        ];

        let summary = analyze(&records, &catalog);
        let report = summary.report().unwrap();
        assert_eq!(report.runs, 4);
        // The WARNING run counts as passed.
        assert_eq!(report.success_rate, 75.0);
        assert_eq!(report.failure_rate, 25.0);

        let duration = report.metric(RUN_DURATION_METRIC).unwrap();
        assert_eq!(duration.slope, 10.0);
        assert_eq!(duration.direction, TrendDirection::Degrading);

        let startup = report.metric("bench.startup_ms").unwrap();
        assert_eq!(startup.direction, TrendDirection::Degrading);
        assert_eq!(startup.latest, 160.0);

        assert!(report.metric(RUN_SUCCESS_RATE_METRIC).is_some());
        assert!(report.degrading().count() >= 2);
    }
}
