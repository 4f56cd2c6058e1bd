//! Check definitions.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default per-check timeout (5 minutes).
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(300);

/// Category of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Formatters, linters, type checkers.
    Quality,
    /// Test suites.
    Test,
    /// Vulnerability and secret scanners.
    Security,
    /// Benchmarks producing numeric metrics.
    Performance,
    /// Anything else.
    #[default]
    Custom,
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CheckKind::Quality => "quality",
            CheckKind::Test => "test",
            CheckKind::Security => "security",
            CheckKind::Performance => "performance",
            CheckKind::Custom => "custom",
        };
        write!(f, "{name}")
    }
}

/// Which way a metric moves when it gets worse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetricDirection {
    /// Durations, memory, error counts.
    #[default]
    HigherIsWorse,
    /// Throughput, success rates.
    HigherIsBetter,
}

/// A numeric metric a check reports through its result metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Metadata key, e.g. `benchmark.startup_time_ms`.
    pub name: String,

    /// Direction of degradation.
    #[serde(default)]
    pub direction: MetricDirection,
}

impl MetricSpec {
    /// A metric where larger values are regressions.
    pub fn higher_is_worse(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: MetricDirection::HigherIsWorse,
        }
    }

    /// A metric where smaller values are regressions.
    pub fn higher_is_better(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: MetricDirection::HigherIsBetter,
        }
    }
}

/// Registered metrics keyed by name.
///
/// The first registration of a name wins, so two checks reporting the same
/// metric cannot disagree on its direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricCatalog {
    metrics: BTreeMap<String, MetricDirection>,
}

impl MetricCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a metric. Returns `false` if the name was already present.
    pub fn insert(&mut self, spec: MetricSpec) -> bool {
        if self.metrics.contains_key(&spec.name) {
            return false;
        }
        self.metrics.insert(spec.name, spec.direction);
        true
    }

    /// Direction of a registered metric.
    pub fn direction(&self, name: &str) -> Option<MetricDirection> {
        self.metrics.get(name).copied()
    }

    /// Whether the metric is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    /// Registered metrics in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, MetricDirection)> {
        self.metrics.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl FromIterator<MetricSpec> for MetricCatalog {
    fn from_iter<I: IntoIterator<Item = MetricSpec>>(iter: I) -> Self {
        let mut catalog = MetricCatalog::new();
        for spec in iter {
            catalog.insert(spec);
        }
        catalog
    }
}

/// A registered verification task.
///
/// Checks are immutable once registered; the builder methods consume and
/// return `self` so a definition is assembled in one expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    /// Unique name.
    pub name: String,

    /// Names of checks that must finish before this one starts.
    pub depends_on: Vec<String>,

    /// Maximum execution time.
    pub timeout: Duration,

    /// Whether the check may share its batch's worker pool with other checks.
    pub parallelizable: bool,

    /// Category.
    pub kind: CheckKind,

    /// Metrics reported through result metadata.
    pub metrics: Vec<MetricSpec>,
}

impl Check {
    /// Create a check with no dependencies and the default timeout.
    pub fn new(name: impl Into<String>, kind: CheckKind) -> Self {
        Self {
            name: name.into(),
            depends_on: Vec::new(),
            timeout: DEFAULT_CHECK_TIMEOUT,
            parallelizable: true,
            kind,
            metrics: Vec::new(),
        }
    }

    /// Add a dependency. Repeated names are ignored.
    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        let dependency = dependency.into();
        if !self.depends_on.contains(&dependency) {
            self.depends_on.push(dependency);
        }
        self
    }

    /// Add several dependencies.
    pub fn depends_on_all<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dependency in dependencies {
            self = self.depends_on(dependency);
        }
        self
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Mark the check as requiring exclusive execution.
    pub fn exclusive(mut self) -> Self {
        self.parallelizable = false;
        self
    }

    /// Register a metric reported by this check.
    pub fn with_metric(mut self, metric: MetricSpec) -> Self {
        if !self.metrics.iter().any(|m| m.name == metric.name) {
            self.metrics.push(metric);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_builder() {
        let check = Check::new("deploy-check", CheckKind::Custom)
            .depends_on("test")
            .depends_on("test")
            .depends_on_all(["lint", "audit"])
            .with_timeout(Duration::from_secs(30))
            .exclusive();

        assert_eq!(check.depends_on, vec!["test", "lint", "audit"]);
        assert_eq!(check.timeout, Duration::from_secs(30));
        assert!(!check.parallelizable);
    }

    #[test]
    fn test_metric_registration_dedup() {
        let check = Check::new("bench", CheckKind::Performance)
            .with_metric(MetricSpec::higher_is_worse("benchmark.startup_time_ms"))
            .with_metric(MetricSpec::higher_is_better("benchmark.startup_time_ms"))
            .with_metric(MetricSpec::higher_is_better("benchmark.throughput"));

        assert_eq!(check.metrics.len(), 2);
        assert_eq!(check.metrics[0].direction, MetricDirection::HigherIsWorse);
    }

    #[test]
    fn test_catalog_first_registration_wins() {
        let catalog: MetricCatalog = [
            MetricSpec::higher_is_better("bench.throughput"),
            MetricSpec::higher_is_worse("bench.throughput"),
            MetricSpec::higher_is_worse("bench.rss_mb"),
        ]
        .into_iter()
        .collect();

        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.direction("bench.throughput"),
            Some(MetricDirection::HigherIsBetter)
        );
        assert!(catalog.direction("missing").is_none());
    }

    #[test]
    fn test_kind_serde() {
        let json = serde_json::to_string(&CheckKind::Security).unwrap();
        assert_eq!(json, "\"security\"");
        let kind: CheckKind = serde_json::from_str("\"performance\"").unwrap();
        assert_eq!(kind, CheckKind::Performance);
    }
}
