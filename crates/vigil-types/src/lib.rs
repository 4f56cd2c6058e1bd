//! Vigil Types: the shared data model of the check orchestration engine.
//!
//! Every crate in the workspace speaks in terms of these types:
//!
//! - [`Check`]: a registry entry describing one verification task
//! - [`CheckResult`]: the immutable outcome of one check execution
//! - [`SimulationResult`]: the aggregated outcome of a whole run
//! - [`RegressionIssue`]: a metric that worsened beyond its threshold
//!
//! # Status precedence
//!
//! ```text
//! FAILURE > TIMEOUT > WARNING > SUCCESS > SKIPPED
//! ```
//!
//! The worst status among all check results becomes the overall status of a
//! run. A run made entirely of skipped checks is itself `SKIPPED`.

pub mod check;
pub mod regression;
pub mod result;
pub mod simulation;

pub use check::{Check, CheckKind, MetricCatalog, MetricDirection, MetricSpec};
pub use regression::{RegressionIssue, Severity};
pub use result::{CheckResult, CheckStatus, FAULT_KEY, MetadataValue};
pub use simulation::{RunId, SimulationResult, StatusCounts};
