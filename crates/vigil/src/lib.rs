//! Vigil: check orchestration and regression analysis.
//!
//! This crate ties the engine together. A [`Pipeline`] takes an
//! [`EngineConfig`] and a [`CheckerSet`], then for every run:
//!
//! 1. resolves the requested checks into dependency batches
//! 2. executes the batches on a bounded worker pool
//! 3. aggregates the results into a [`SimulationResult`]
//! 4. compares check metrics against the stored baseline
//! 5. appends the run to history
//!
//! ```ignore
//! use std::sync::Arc;
//! use vigil::{CheckResult, CheckerSet, EngineConfig, FnChecker, JsonlStore, Pipeline};
//!
//! let config = EngineConfig::from_yaml_str(r#"
//! checks:
//!   - name: lint
//!   - name: test
//!     depends_on: [lint]
//! "#)?;
//! let checkers = CheckerSet::new()
//!     .with("lint", FnChecker::new(|ctx| async move { Ok(CheckResult::success(ctx.name())) }))
//!     .with("test", FnChecker::new(|ctx| async move { Ok(CheckResult::success(ctx.name())) }));
//! let pipeline = Pipeline::new(config, checkers)?
//!     .with_history(Arc::new(JsonlStore::new(".vigil").await?));
//! let report = pipeline.run(&["test"]).await?;
//! println!("{}", report.result.summary);
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod tracing_config;

pub use config::{CheckConfig, ConfigProvider, EngineConfig, FileConfig, StaticConfig};
pub use error::{VigilError, VigilResult};
pub use pipeline::{Pipeline, RunReport};
pub use report::{JsonRenderer, RenderedReport, ReportRenderer};
pub use tracing_config::{TracingConfig, TracingFormat, init_default_tracing, init_tracing};

pub use vigil_history::{
    Baseline, HistoryError, HistoryRecord, HistoryStore, HistoryTracker, JsonlStore, MemoryStore,
    QualitySnapshot, RegressionDetector, SqliteStore, TrendSummary,
};
pub use vigil_sched::{
    AbortHandle, CancelSignal, CheckContext, CheckRegistry, Checker, CheckerError, CheckerSet,
    ExecutionPlan, FnChecker, SchedError, SchedulerEvent,
};
pub use vigil_types::{
    Check, CheckKind, CheckResult, CheckStatus, MetricDirection, MetricSpec, RegressionIssue,
    Severity, SimulationResult,
};
