//! Check results.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Metadata key marking a result as an infrastructure fault.
pub const FAULT_KEY: &str = "fault";

/// Status of a single check execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// The check passed.
    Success,
    /// The check found problems, or its tool could not run.
    Failure,
    /// The check passed with findings worth reading.
    Warning,
    /// The check was not executed.
    Skipped,
    /// The check exceeded its timeout.
    Timeout,
}

impl CheckStatus {
    /// Precedence rank used for aggregation. Higher wins.
    pub fn rank(&self) -> u8 {
        match self {
            CheckStatus::Skipped => 0,
            CheckStatus::Success => 1,
            CheckStatus::Warning => 2,
            CheckStatus::Timeout => 3,
            CheckStatus::Failure => 4,
        }
    }

    /// The worst status of the sequence, or `Skipped` when it is empty.
    pub fn worst<I>(statuses: I) -> CheckStatus
    where
        I: IntoIterator<Item = CheckStatus>,
    {
        statuses
            .into_iter()
            .max_by_key(CheckStatus::rank)
            .unwrap_or(CheckStatus::Skipped)
    }

    /// Whether dependents of a check with this status must be skipped.
    pub fn is_blocking(&self) -> bool {
        matches!(self, CheckStatus::Failure | CheckStatus::Timeout)
    }

    /// Whether the status counts as a pass.
    pub fn is_successful(&self) -> bool {
        matches!(self, CheckStatus::Success | CheckStatus::Warning)
    }

    /// Upper-case display name.
    pub fn name(&self) -> &'static str {
        match self {
            CheckStatus::Success => "SUCCESS",
            CheckStatus::Failure => "FAILURE",
            CheckStatus::Warning => "WARNING",
            CheckStatus::Skipped => "SKIPPED",
            CheckStatus::Timeout => "TIMEOUT",
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed metadata value.
///
/// Numeric metrics are the only values the regression detector looks at, so
/// text and flags can never be mistaken for measurements.
///
/// JSON has no NaN or infinity. Non-finite numbers are stored as text
/// (`"NaN"`, `"inf"`, `"-inf"`) so a record holding one still reads back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Boolean marker, e.g. `fault = true`.
    Flag(bool),
    /// Numeric measurement.
    #[serde(serialize_with = "serialize_number")]
    Number(f64),
    /// Free-form text.
    Text(String),
}

impl MetadataValue {
    /// The numeric value, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetadataValue::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    /// The boolean value, if this is a flag.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            MetadataValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    /// The text value, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

fn serialize_number<S: serde::Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.collect_str(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            MetadataValue::Number(value)
        } else {
            MetadataValue::Text(value.to_string())
        }
    }
}

impl From<u64> for MetadataValue {
    fn from(value: u64) -> Self {
        MetadataValue::Number(value as f64)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Number(value as f64)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Flag(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

/// Outcome of one check execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Name of the check.
    pub name: String,

    /// Final status.
    pub status: CheckStatus,

    /// Wall-clock execution time.
    pub duration: Duration,

    /// Captured tool output.
    #[serde(default)]
    pub output: String,

    /// Errors, in the order the tool reported them.
    #[serde(default)]
    pub errors: Vec<String>,

    /// Warnings, in order.
    #[serde(default)]
    pub warnings: Vec<String>,

    /// Suggested fixes, in order.
    #[serde(default)]
    pub suggestions: Vec<String>,

    /// Typed metadata, including numeric metrics.
    #[serde(default)]
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl CheckResult {
    /// Create an empty result with the given status.
    pub fn new(name: impl Into<String>, status: CheckStatus) -> Self {
        Self {
            name: name.into(),
            status,
            duration: Duration::ZERO,
            output: String::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            suggestions: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// A passing result.
    pub fn success(name: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Success)
    }

    /// A passing result with findings.
    pub fn warning(name: impl Into<String>, warning: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Warning).with_warning(warning)
    }

    /// An expected failure: the checked code is broken.
    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Failure).with_error(error)
    }

    /// An infrastructure fault: the environment is broken.
    pub fn fault(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Failure)
            .with_error(message)
            .with_metadata(FAULT_KEY, true)
    }

    /// A check that was never dispatched.
    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(name, CheckStatus::Skipped)
            .with_output(reason.clone())
            .with_metadata("skip_reason", reason)
    }

    /// A check that exceeded its timeout.
    pub fn timed_out(name: impl Into<String>, timeout: Duration) -> Self {
        Self::new(name, CheckStatus::Timeout)
            .with_duration(timeout)
            .with_error(format!(
                "Check timed out after {:.1} seconds",
                timeout.as_secs_f64()
            ))
    }

    /// Replace the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the captured output.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Append an error.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    /// Append a warning.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Append a suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Insert a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether the failure came from the environment rather than the code.
    pub fn is_fault(&self) -> bool {
        self.metadata
            .get(FAULT_KEY)
            .and_then(MetadataValue::as_flag)
            .unwrap_or(false)
    }

    /// Whether the check passed (SUCCESS or WARNING).
    pub fn is_successful(&self) -> bool {
        self.status.is_successful()
    }

    /// Whether the result carries errors or failed.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || self.status == CheckStatus::Failure
    }

    /// Numeric metadata value for `key`.
    pub fn numeric_metric(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(MetadataValue::as_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_precedence() {
        use CheckStatus::*;
        assert_eq!(CheckStatus::worst([Failure, Warning, Success]), Failure);
        assert_eq!(CheckStatus::worst([Warning, Success]), Warning);
        assert_eq!(CheckStatus::worst([Timeout, Warning]), Timeout);
        assert_eq!(CheckStatus::worst([Timeout, Failure]), Failure);
        assert_eq!(CheckStatus::worst([Success, Skipped]), Success);
        assert_eq!(CheckStatus::worst([Skipped, Skipped]), Skipped);
        assert_eq!(CheckStatus::worst([]), Skipped);
    }

    #[test]
    fn test_blocking_statuses() {
        assert!(CheckStatus::Failure.is_blocking());
        assert!(CheckStatus::Timeout.is_blocking());
        assert!(!CheckStatus::Warning.is_blocking());
        assert!(!CheckStatus::Skipped.is_blocking());
    }

    #[test]
    fn test_fault_marker() {
        let fault = CheckResult::fault("audit", "cargo-audit not installed");
        assert_eq!(fault.status, CheckStatus::Failure);
        assert!(fault.is_fault());

        let failure = CheckResult::failure("lint", "unused import");
        assert!(!failure.is_fault());
        assert!(failure.has_errors());
    }

    #[test]
    fn test_numeric_metric_rejects_other_values() {
        let result = CheckResult::success("bench")
            .with_metadata("benchmark.startup_time_ms", 120.0)
            .with_metadata("benchmark.label", "cold")
            .with_metadata("benchmark.cached", false)
            .with_metadata("benchmark.nan", f64::NAN);

        assert_eq!(result.numeric_metric("benchmark.startup_time_ms"), Some(120.0));
        assert_eq!(result.numeric_metric("benchmark.label"), None);
        assert_eq!(result.numeric_metric("benchmark.cached"), None);
        assert_eq!(result.numeric_metric("benchmark.nan"), None);
        assert_eq!(result.numeric_metric("missing"), None);
    }

    #[test]
    fn test_metadata_serde_untagged() {
        let result = CheckResult::success("bench")
            .with_metadata("ms", 12.5)
            .with_metadata(FAULT_KEY, true)
            .with_metadata("tool", "criterion");
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"ms\":12.5"));
        assert!(json.contains("\"fault\":true"));

        let parsed: CheckResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn test_non_finite_numbers_survive_json() {
        let result = CheckResult::success("bench")
            .with_metadata("nan", f64::NAN)
            .with_metadata("neg_inf", f64::NEG_INFINITY);
        assert_eq!(result.metadata["nan"], MetadataValue::Text("NaN".to_string()));
        assert_eq!(result.numeric_metric("nan"), None);

        let json = serde_json::to_string(&result).unwrap();
        let parsed: CheckResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);

        // Built directly, the number is written as text as well.
        let direct = MetadataValue::Number(f64::INFINITY);
        assert_eq!(serde_json::to_string(&direct).unwrap(), "\"inf\"");
        let parsed: MetadataValue = serde_json::from_str("\"inf\"").unwrap();
        assert_eq!(parsed.as_number(), None);
    }

    #[test]
    fn test_timed_out_result() {
        let result = CheckResult::timed_out("slow", Duration::from_secs(2));
        assert_eq!(result.status, CheckStatus::Timeout);
        assert_eq!(result.duration, Duration::from_secs(2));
        assert_eq!(result.errors, vec!["Check timed out after 2.0 seconds"]);
    }
}
