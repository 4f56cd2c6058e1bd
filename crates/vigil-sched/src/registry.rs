//! Check registry.

use std::time::Duration;

use serde::Serialize;
use vigil_types::{Check, CheckKind, MetricCatalog};

use crate::error::{SchedError, SchedResult};

/// Descriptive view of a registered check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckInfo {
    pub name: String,
    pub kind: CheckKind,
    pub depends_on: Vec<String>,
    /// Registered checks that declare a direct dependency on this one.
    pub dependents: Vec<String>,
    pub timeout: Duration,
    pub parallelizable: bool,
    pub metrics: Vec<String>,
}

/// Registry of check definitions, keyed by name.
///
/// Preserves registration order. Entries cannot be replaced or removed; the
/// registry is shared read-only (behind an `Arc`) while a run executes.
#[derive(Debug, Clone, Default)]
pub struct CheckRegistry {
    checks: Vec<Check>,
    index: rustc_hash::FxHashMap<String, usize>,
}

impl CheckRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from definitions and validate it.
    pub fn from_checks(checks: impl IntoIterator<Item = Check>) -> SchedResult<Self> {
        let mut registry = Self::new();
        for check in checks {
            registry.register(check)?;
        }
        registry.validate()?;
        Ok(registry)
    }

    /// Register a check.
    pub fn register(&mut self, check: Check) -> SchedResult<()> {
        if check.name.trim().is_empty() {
            return Err(SchedError::InvalidConfig(
                "check name cannot be empty".to_string(),
            ));
        }
        if check.timeout.is_zero() {
            return Err(SchedError::InvalidConfig(format!(
                "check '{}' has a zero timeout",
                check.name
            )));
        }
        if self.index.contains_key(&check.name) {
            return Err(SchedError::DuplicateCheck(check.name));
        }

        tracing::debug!(check = %check.name, kind = %check.kind, "registered check");
        self.index.insert(check.name.clone(), self.checks.len());
        self.checks.push(check);
        Ok(())
    }

    /// Verify that every declared dependency is registered.
    pub fn validate(&self) -> SchedResult<()> {
        for check in &self.checks {
            for dep in &check.depends_on {
                if !self.contains(dep) {
                    return Err(SchedError::UnknownCheck(dep.clone()));
                }
            }
        }
        Ok(())
    }

    /// Get a check by name.
    pub fn get(&self, name: &str) -> Option<&Check> {
        self.index.get(name).map(|&idx| &self.checks[idx])
    }

    /// Whether a check is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.checks.iter().map(|c| c.name.as_str()).collect()
    }

    /// Iterate over checks in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter()
    }

    /// Number of registered checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Every metric registered by any check.
    pub fn metric_catalog(&self) -> MetricCatalog {
        self.checks
            .iter()
            .flat_map(|c| c.metrics.iter().cloned())
            .collect()
    }

    /// Checks that declare a direct dependency on `name`.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| c.depends_on.iter().any(|d| d == name))
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Describe one check.
    pub fn check_info(&self, name: &str) -> Option<CheckInfo> {
        let check = self.get(name)?;
        Some(CheckInfo {
            name: check.name.clone(),
            kind: check.kind,
            depends_on: check.depends_on.clone(),
            dependents: self.dependents(name).into_iter().map(String::from).collect(),
            timeout: check.timeout,
            parallelizable: check.parallelizable,
            metrics: check.metrics.iter().map(|m| m.name.clone()).collect(),
        })
    }

    /// Describe every check, in registration order.
    pub fn list_checks(&self) -> Vec<CheckInfo> {
        self.checks
            .iter()
            .filter_map(|c| self.check_info(&c.name))
            .collect()
    }

    /// Problems with a selection of check names, without failing.
    ///
    /// Reports unknown names and names selected more than once.
    pub fn validate_selection<S: AsRef<str>>(&self, selection: &[S]) -> Vec<String> {
        let mut problems = Vec::new();

        let unknown: Vec<&str> = selection
            .iter()
            .map(|s| s.as_ref())
            .filter(|name| !self.contains(name))
            .collect();
        if !unknown.is_empty() {
            problems.push(format!(
                "Invalid check names: {}. Available checks: {}",
                unknown.join(", "),
                self.names().join(", ")
            ));
        }

        let mut seen = rustc_hash::FxHashSet::default();
        let mut duplicates = Vec::new();
        for name in selection.iter().map(|s| s.as_ref()) {
            if !seen.insert(name) && !duplicates.contains(&name) {
                duplicates.push(name);
            }
        }
        if !duplicates.is_empty() {
            problems.push(format!("Duplicate check names: {}", duplicates.join(", ")));
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_types::MetricSpec;

    fn registry() -> CheckRegistry {
        CheckRegistry::from_checks([
            Check::new("lint", CheckKind::Quality),
            Check::new("test", CheckKind::Test).depends_on("lint"),
            Check::new("bench", CheckKind::Performance)
                .depends_on("test")
                .with_metric(MetricSpec::higher_is_worse("benchmark.startup_time_ms")),
        ])
        .unwrap()
    }

    #[test]
    fn test_registry_basic() {
        let registry = registry();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.names(), vec!["lint", "test", "bench"]);
        assert!(registry.contains("test"));
        assert!(registry.get("deploy").is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = registry();
        let err = registry
            .register(Check::new("lint", CheckKind::Quality))
            .unwrap_err();
        assert_eq!(err, SchedError::DuplicateCheck("lint".to_string()));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_unknown_dependency() {
        let err = CheckRegistry::from_checks([
            Check::new("test", CheckKind::Test).depends_on("build"),
        ])
        .unwrap_err();
        assert_eq!(err, SchedError::UnknownCheck("build".to_string()));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut registry = CheckRegistry::new();
        let err = registry
            .register(Check::new("lint", CheckKind::Quality).with_timeout(Duration::ZERO))
            .unwrap_err();
        assert!(matches!(err, SchedError::InvalidConfig(_)));
    }

    #[test]
    fn test_check_info() {
        let registry = registry();
        let info = registry.check_info("test").unwrap();
        assert_eq!(info.depends_on, vec!["lint"]);
        assert_eq!(info.dependents, vec!["bench"]);
        assert_eq!(registry.list_checks().len(), 3);
        assert_eq!(registry.metric_catalog().len(), 1);
    }

    #[test]
    fn test_validate_selection() {
        let registry = registry();
        assert!(registry.validate_selection(&["lint", "test"]).is_empty());

        let problems = registry.validate_selection(&["lint", "deploy", "lint"]);
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("deploy"));
        assert!(problems[1].contains("lint"));
    }
}
