//! Engine configuration.
//!
//! Configuration is plain serde data. Where it comes from is the business of
//! a [`ConfigProvider`]: [`StaticConfig`] wraps an in-memory value and
//! [`FileConfig`] reads YAML or JSON from disk.
//!
//! ```yaml
//! max_parallelism: 4
//! regression_threshold: 20.0
//! checks:
//!   - name: lint
//!     kind: quality
//!   - name: test
//!     kind: test
//!     depends_on: [lint]
//!     timeout_secs: 600
//!   - name: bench
//!     kind: performance
//!     parallelizable: false
//!     metrics:
//!       - name: benchmark.startup_time_ms
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vigil_sched::{CheckRegistry, SchedulerConfig};
use vigil_types::{Check, CheckKind, MetricSpec};

use crate::error::{VigilError, VigilResult};

/// Source of an [`EngineConfig`].
pub trait ConfigProvider: Send + Sync {
    /// Produce the configuration for the next run.
    fn engine_config(&self) -> VigilResult<EngineConfig>;
}

/// A fixed, in-memory configuration.
#[derive(Debug, Clone)]
pub struct StaticConfig(EngineConfig);

impl StaticConfig {
    pub fn new(config: EngineConfig) -> Self {
        Self(config)
    }
}

impl ConfigProvider for StaticConfig {
    fn engine_config(&self) -> VigilResult<EngineConfig> {
        self.0.validate()?;
        Ok(self.0.clone())
    }
}

/// Configuration read from a YAML or JSON file on each call, with
/// environment overrides applied on top.
#[derive(Debug, Clone)]
pub struct FileConfig {
    path: PathBuf,
}

impl FileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for FileConfig {
    fn engine_config(&self) -> VigilResult<EngineConfig> {
        let config = EngineConfig::from_file(&self.path)?.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }
}

/// Declaration of one check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConfig {
    pub name: String,

    #[serde(default)]
    pub kind: CheckKind,

    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Per-check timeout in seconds.
    #[serde(default = "default_check_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_parallelizable")]
    pub parallelizable: bool,

    #[serde(default)]
    pub metrics: Vec<MetricSpec>,
}

impl CheckConfig {
    pub fn new(name: impl Into<String>, kind: CheckKind) -> Self {
        Self {
            name: name.into(),
            kind,
            depends_on: Vec::new(),
            timeout_secs: default_check_timeout_secs(),
            parallelizable: default_parallelizable(),
            metrics: Vec::new(),
        }
    }

    /// The check definition this entry declares.
    pub fn to_check(&self) -> Check {
        let mut check = Check::new(self.name.clone(), self.kind)
            .depends_on_all(self.depends_on.iter().cloned())
            .with_timeout(Duration::from_secs(self.timeout_secs));
        if !self.parallelizable {
            check = check.exclusive();
        }
        for metric in &self.metrics {
            check = check.with_metric(metric.clone());
        }
        check
    }
}

/// Typed engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Worker pool size. Values below 1 run one check at a time.
    #[serde(default = "default_max_parallelism")]
    pub max_parallelism: usize,

    /// Deadline for the whole run, checked between batches.
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,

    /// Percentage a metric must worsen by to count as a regression.
    #[serde(default = "default_regression_threshold")]
    pub regression_threshold: f64,

    /// Number of recent runs used for trends and suggestions.
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,

    #[serde(default)]
    pub checks: Vec<CheckConfig>,
}

fn default_check_timeout_secs() -> u64 {
    vigil_types::check::DEFAULT_CHECK_TIMEOUT.as_secs()
}

fn default_parallelizable() -> bool {
    true
}

fn default_max_parallelism() -> usize {
    SchedulerConfig::default().max_parallelism
}

fn default_regression_threshold() -> f64 {
    vigil_history::DEFAULT_THRESHOLD
}

fn default_trend_window() -> usize {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallelism: default_max_parallelism(),
            run_timeout_secs: None,
            regression_threshold: default_regression_threshold(),
            trend_window: default_trend_window(),
            checks: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse YAML.
    pub fn from_yaml_str(yaml: &str) -> VigilResult<Self> {
        serde_yaml_ng::from_str(yaml).map_err(|e| VigilError::ParseError(e.to_string()))
    }

    /// Parse JSON.
    pub fn from_json_str(json: &str) -> VigilResult<Self> {
        serde_json::from_str(json).map_err(|e| VigilError::ParseError(e.to_string()))
    }

    /// Load from a file. `.json` files are parsed as JSON, anything else as
    /// YAML.
    pub fn from_file(path: impl AsRef<Path>) -> VigilResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| VigilError::IoError(format!("{}: {e}", path.display())))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_str(&contents)?
        } else {
            Self::from_yaml_str(&contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply `VIGIL_MAX_PARALLELISM`, `VIGIL_RUN_TIMEOUT_SECS`,
    /// `VIGIL_REGRESSION_THRESHOLD` and `VIGIL_TREND_WINDOW`.
    pub fn with_env_overrides(self) -> VigilResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> VigilResult<Self> {
        if let Some(value) = lookup("VIGIL_MAX_PARALLELISM") {
            self.max_parallelism = parse_override("VIGIL_MAX_PARALLELISM", &value)?;
        }
        if let Some(value) = lookup("VIGIL_RUN_TIMEOUT_SECS") {
            self.run_timeout_secs = Some(parse_override("VIGIL_RUN_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = lookup("VIGIL_REGRESSION_THRESHOLD") {
            self.regression_threshold = parse_override("VIGIL_REGRESSION_THRESHOLD", &value)?;
        }
        if let Some(value) = lookup("VIGIL_TREND_WINDOW") {
            self.trend_window = parse_override("VIGIL_TREND_WINDOW", &value)?;
        }
        Ok(self)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> VigilResult<()> {
        if !self.regression_threshold.is_finite() || self.regression_threshold <= 0.0 {
            return Err(VigilError::ValidationError(format!(
                "regression_threshold must be a positive number, got {}",
                self.regression_threshold
            )));
        }
        if self.trend_window == 0 {
            return Err(VigilError::ValidationError(
                "trend_window must be at least 1".to_string(),
            ));
        }
        if self.run_timeout_secs == Some(0) {
            return Err(VigilError::ValidationError(
                "run_timeout_secs must be greater than 0".to_string(),
            ));
        }
        for check in &self.checks {
            if check.timeout_secs == 0 {
                return Err(VigilError::ValidationError(format!(
                    "Check '{}' must have timeout_secs greater than 0",
                    check.name
                )));
            }
        }
        Ok(())
    }

    /// Build and validate the check registry.
    pub fn registry(&self) -> VigilResult<CheckRegistry> {
        let registry = CheckRegistry::from_checks(self.checks.iter().map(CheckConfig::to_check))?;
        Ok(registry)
    }

    /// Scheduler settings.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let config = SchedulerConfig::default().with_max_parallelism(self.max_parallelism);
        match self.run_timeout_secs {
            Some(secs) => config.with_run_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> VigilResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| VigilError::ParseError(format!("{key}={value}: {e}")))
}
