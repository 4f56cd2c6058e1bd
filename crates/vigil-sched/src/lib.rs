//! Vigil Sched: dependency resolution and bounded-parallel check execution.
//!
//! This crate turns a request for named checks into an ordered execution plan
//! and runs it:
//!
//! - [`CheckRegistry`]: the set of known check definitions
//! - [`DependencyResolver`]: expands and batches a request into an [`ExecutionPlan`]
//! - [`Scheduler`]: executes a plan against a [`CheckerSet`] with a worker pool
//! - [`ResultAggregator`]: folds the results into a `SimulationResult`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vigil_sched::{
//!     CheckRegistry, CheckerSet, DependencyResolver, ResultAggregator, Scheduler,
//!     SchedulerConfig,
//! };
//! use vigil_types::{Check, CheckKind};
//!
//! let registry = Arc::new(CheckRegistry::from_checks([
//!     Check::new("lint", CheckKind::Quality),
//!     Check::new("test", CheckKind::Test).depends_on("lint"),
//! ])?);
//! let plan = DependencyResolver::new(registry).resolve(&["test"])?;
//!
//! let scheduler = Scheduler::new(SchedulerConfig::default(), checkers);
//! let outcome = scheduler.execute(&plan).await;
//! let result = ResultAggregator::new().aggregate(&outcome.results, outcome.elapsed);
//! ```
//!
//! # Failure handling
//!
//! Once a plan exists, execution never returns an error. Checker errors and
//! panics become fault results, expired timeouts become `TIMEOUT` results, and
//! every check downstream of a `FAILURE` or `TIMEOUT` is `SKIPPED`.

pub mod aggregator;
pub mod checker;
pub mod error;
pub mod events;
pub mod registry;
pub mod resolver;
pub mod scheduler;

pub use aggregator::ResultAggregator;
pub use checker::{AbortHandle, CancelSignal, CheckContext, Checker, CheckerSet, FnChecker};
pub use error::{CheckerError, SchedError, SchedResult};
pub use events::SchedulerEvent;
pub use registry::{CheckInfo, CheckRegistry};
pub use resolver::{BatchSummary, DependencyResolver, ExecutionPlan, PlanSummary};
pub use scheduler::{
    ABORT_REASON, DEADLINE_REASON, ExecutionOutcome, Scheduler, SchedulerConfig,
};
