//! Improvement suggestions derived from run history.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::record::{HistoryRecord, RUN_DURATION_METRIC, RUN_SUCCESS_RATE_METRIC};
use crate::trend::{TrendDirection, TrendReport};

/// Minimum number of runs of a check before it is judged.
pub const MIN_RUNS: usize = 3;

/// Non-successful share above which a check counts as frequently failing.
pub const FAILURE_RATE_THRESHOLD: f64 = 0.3;

/// Mean duration above which a check counts as slow.
pub const SLOW_CHECK_THRESHOLD: Duration = Duration::from_secs(10);

/// Number of error patterns reported.
pub const TOP_ERROR_PATTERNS: usize = 5;

const MAX_PATTERN_LEN: usize = 100;

/// Checks run at least [`MIN_RUNS`] times that failed in at least
/// [`FAILURE_RATE_THRESHOLD`] of them, worst first.
pub fn frequent_failures(records: &[HistoryRecord]) -> Vec<(String, f64)> {
    let mut stats: std::collections::BTreeMap<&str, (usize, usize)> = Default::default();
    for record in records {
        for (name, result) in &record.result.check_results {
            let entry = stats.entry(name.as_str()).or_default();
            entry.0 += 1;
            if !result.is_successful() {
                entry.1 += 1;
            }
        }
    }

    let mut failing: Vec<(String, f64)> = stats
        .into_iter()
        .filter(|(_, (runs, _))| *runs >= MIN_RUNS)
        .map(|(name, (runs, failures))| (name.to_string(), failures as f64 / runs as f64))
        .filter(|(_, rate)| *rate >= FAILURE_RATE_THRESHOLD)
        .collect();
    failing.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    failing
}

/// Checks run at least [`MIN_RUNS`] times whose mean duration exceeds
/// [`SLOW_CHECK_THRESHOLD`], slowest first.
pub fn slow_checks(records: &[HistoryRecord]) -> Vec<(String, Duration)> {
    let mut stats: std::collections::BTreeMap<&str, (usize, Duration)> = Default::default();
    for record in records {
        for (name, result) in &record.result.check_results {
            let entry = stats.entry(name.as_str()).or_default();
            entry.0 += 1;
            entry.1 += result.duration;
        }
    }

    let mut slow: Vec<(String, Duration)> = stats
        .into_iter()
        .filter(|(_, (runs, _))| *runs >= MIN_RUNS)
        .map(|(name, (runs, total))| (name.to_string(), total / runs as u32))
        .filter(|(_, mean)| *mean > SLOW_CHECK_THRESHOLD)
        .collect();
    slow.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    slow
}

/// Most common normalized error messages, most frequent first.
pub fn common_errors(records: &[HistoryRecord]) -> Vec<(String, usize)> {
    let mut counts: rustc_hash::FxHashMap<String, usize> = rustc_hash::FxHashMap::default();
    for record in records {
        for result in record.result.check_results.values() {
            for error in &result.errors {
                *counts.entry(normalize_error(error)).or_default() += 1;
            }
        }
    }

    let mut patterns: Vec<(String, usize)> = counts.into_iter().collect();
    patterns.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    patterns.truncate(TOP_ERROR_PATTERNS);
    patterns
}

static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\S*/\S+\.\w+:\d+(?::\d+)*").expect("location regex must compile")
});
static LINE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"line \d+").expect("line regex must compile"));
static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit regex must compile"));
static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'[^']*'").expect("quote regex must compile"));

/// Reduce an error message to its shape: `path:line` locations become
/// `<file>`, digit runs become `<num>`, and single-quoted values become
/// `<value>`. The result is trimmed and cut to 100 characters.
pub fn normalize_error(error: &str) -> String {
    let normalized = LOCATION.replace_all(error, "<file>");
    let normalized = LINE_NUMBER.replace_all(&normalized, "line <num>");
    let normalized = DIGITS.replace_all(&normalized, "<num>");
    let normalized = QUOTED.replace_all(&normalized, "<value>");

    let trimmed = normalized.trim();
    match trimmed.char_indices().nth(MAX_PATTERN_LEN) {
        Some((end, _)) => trimmed[..end].to_string(),
        None => trimmed.to_string(),
    }
}

/// Human-readable suggestions for a window of runs.
pub fn suggest(records: &[HistoryRecord], trends: Option<&TrendReport>) -> Vec<String> {
    if records.is_empty() {
        return vec!["No historical data available for analysis".to_string()];
    }

    let mut suggestions = Vec::new();

    if let Some(report) = trends {
        if let Some(rate) = report.metric(RUN_SUCCESS_RATE_METRIC) {
            match rate.direction {
                TrendDirection::Degrading => suggestions.push(format!(
                    "Success rate has been declining over the last {} runs. Review recent changes.",
                    report.runs
                )),
                TrendDirection::Improving => {
                    suggestions.push("Success rate is improving.".to_string())
                }
                TrendDirection::Flat => {}
            }
        }
        if report
            .metric(RUN_DURATION_METRIC)
            .is_some_and(|m| m.direction == TrendDirection::Degrading)
        {
            suggestions.push(
                "Execution time is increasing. Consider optimizing slow checks or raising parallelism."
                    .to_string(),
            );
        }
        for metric in report.degrading() {
            if metric.metric == RUN_SUCCESS_RATE_METRIC || metric.metric == RUN_DURATION_METRIC {
                continue;
            }
            suggestions.push(format!(
                "Metric {} is degrading (latest {}, mean {:.2}).",
                metric.metric, metric.latest, metric.mean
            ));
        }
    }

    let errors = common_errors(records);
    if !errors.is_empty() {
        let patterns: Vec<&str> = errors.iter().take(3).map(|(p, _)| p.as_str()).collect();
        suggestions.push(format!(
            "Most common error types: {}. Focus on addressing these recurring issues.",
            patterns.join(", ")
        ));
    }

    let failing = frequent_failures(records);
    if !failing.is_empty() {
        let names: Vec<&str> = failing.iter().take(3).map(|(n, _)| n.as_str()).collect();
        suggestions.push(format!(
            "Frequently failing checks: {}. These checks may need attention.",
            names.join(", ")
        ));
    }

    let slow = slow_checks(records);
    if !slow.is_empty() {
        let names: Vec<&str> = slow.iter().take(3).map(|(n, _)| n.as_str()).collect();
        suggestions.push(format!(
            "Slowest checks: {}. Consider optimizing them to shorten runs.",
            names.join(", ")
        ));
    }

    if suggestions.is_empty() {
        suggestions.push("No specific improvement suggestions at this time".to_string());
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use vigil_types::{CheckResult, CheckStatus, SimulationResult};

    fn run(results: Vec<CheckResult>) -> HistoryRecord {
        let map: BTreeMap<String, CheckResult> =
            results.into_iter().map(|r| (r.name.clone(), r)).collect();
        HistoryRecord::new(SimulationResult::new(
            CheckStatus::Success,
            Duration::from_secs(1),
            map,
            "",
        ))
    }

    #[test]
    fn test_normalize_error() {
        assert_eq!(
            normalize_error("src/lib.rs:42 unused variable 'x'"),
            "<file> unused variable <value>"
        );
        assert_eq!(
            normalize_error("expected 3 items, found 12"),
            "expected <num> items, found <num>"
        );
        assert_eq!(normalize_error("  plain  "), "plain");
        assert_eq!(
            normalize_error("/tmp/build/x.py:7:3 error at line 12"),
            "<file> error at line <num>"
        );
        assert_eq!(normalize_error(&"x".repeat(300)).len(), 100);
    }

    #[test]
    fn test_normalize_error_quotes() {
        // An apostrophe inside a word is not a quoted value.
        assert_eq!(normalize_error("don't panic"), "don't panic");
        assert_eq!(normalize_error("cannot find 'foo bar'"), "cannot find <value>");
        assert_eq!(
            normalize_error("module 'os' has no attribute 'path2'"),
            "module <value> has no attribute <value>"
        );
    }

    #[test]
    fn test_frequent_failures() {
        let records: Vec<HistoryRecord> = (0..4)
            .map(|i| {
                let flaky = if i % 2 == 0 {
                    CheckResult::failure("flaky", "boom")
                } else {
                    CheckResult::success("flaky")
                };
                run(vec![flaky, CheckResult::success("stable")])
            })
            .collect();

        let failing = frequent_failures(&records);
        assert_eq!(failing, vec![("flaky".to_string(), 0.5)]);
        // Too few runs to judge.
        assert!(frequent_failures(&records[..2]).is_empty());
    }

    #[test]
    fn test_slow_checks() {
        let records: Vec<HistoryRecord> = (0..3)
            .map(|_| {
                run(vec![
                    CheckResult::success("slow").with_duration(Duration::from_secs(12)),
                    CheckResult::success("fast").with_duration(Duration::from_secs(2)),
                ])
            })
            .collect();
        assert_eq!(
            slow_checks(&records),
            vec![("slow".to_string(), Duration::from_secs(12))]
        );
    }

    #[test]
    fn test_common_errors_top_patterns() {
        let records: Vec<HistoryRecord> = (0..3)
            .map(|i| {
                run(vec![
                    CheckResult::failure("lint", format!("line {i}: missing docs"))
                        .with_error("unused import 'os'"),
                ])
            })
            .collect();
        let errors = common_errors(&records);
        assert_eq!(errors[0].1, 3);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_suggest_fallbacks() {
        assert_eq!(
            suggest(&[], None),
            vec!["No historical data available for analysis"]
        );
        let quiet = vec![run(vec![CheckResult::success("lint")])];
        assert_eq!(
            suggest(&quiet, None),
            vec!["No specific improvement suggestions at this time"]
        );
    }
}
