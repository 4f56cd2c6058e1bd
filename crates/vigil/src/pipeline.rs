//! The run pipeline: resolve, execute, aggregate, compare, record.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use vigil_history::{HistoryRecord, HistoryStore, HistoryTracker, RegressionDetector};
use vigil_sched::{
    AbortHandle, CheckRegistry, CheckerSet, DependencyResolver, ExecutionPlan, ResultAggregator,
    Scheduler, SchedulerEvent,
};
use vigil_types::SimulationResult;

use crate::config::{ConfigProvider, EngineConfig};
use crate::error::VigilResult;
use crate::report::{RenderedReport, ReportRenderer};

/// What one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub result: SimulationResult,

    /// The stored history entry, when history is configured and the append
    /// succeeded.
    pub record: Option<HistoryRecord>,

    /// Whether the run stopped early on abort or deadline.
    pub aborted: bool,
}

/// Wires registry, resolver, scheduler, aggregator, regression detector and
/// history together.
pub struct Pipeline {
    config: EngineConfig,
    resolver: DependencyResolver,
    checkers: CheckerSet,
    detector: RegressionDetector,
    tracker: Option<HistoryTracker>,
    renderers: Vec<Box<dyn ReportRenderer>>,
    events: Option<mpsc::UnboundedSender<SchedulerEvent>>,
}

impl Pipeline {
    /// Build a pipeline. Fails on invalid configuration or check graphs.
    pub fn new(config: EngineConfig, checkers: CheckerSet) -> VigilResult<Self> {
        config.validate()?;
        let registry = Arc::new(config.registry()?);
        let detector = RegressionDetector::new(registry.metric_catalog())
            .with_threshold(config.regression_threshold);

        for check in registry.iter() {
            if !checkers.contains(&check.name) {
                warn!(check = %check.name, "no checker registered");
            }
        }

        Ok(Self {
            config,
            resolver: DependencyResolver::new(registry),
            checkers,
            detector,
            tracker: None,
            renderers: Vec::new(),
            events: None,
        })
    }

    /// Build a pipeline from whatever the provider supplies.
    pub fn from_provider(provider: &dyn ConfigProvider, checkers: CheckerSet) -> VigilResult<Self> {
        Self::new(provider.engine_config()?, checkers)
    }

    /// Record runs in `store` and compare them against its baseline.
    pub fn with_history(mut self, store: Arc<dyn HistoryStore>) -> Self {
        let catalog = self.registry().metric_catalog();
        self.tracker = Some(HistoryTracker::new(store, catalog));
        self
    }

    /// Publish scheduler events on `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn with_renderer(mut self, renderer: impl ReportRenderer + 'static) -> Self {
        self.renderers.push(Box::new(renderer));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CheckRegistry> {
        self.resolver.registry()
    }

    pub fn tracker(&self) -> Option<&HistoryTracker> {
        self.tracker.as_ref()
    }

    /// Resolve a request without running it.
    pub fn plan<S: AsRef<str>>(&self, requested: &[S]) -> VigilResult<ExecutionPlan> {
        Ok(self.resolver.resolve(requested)?)
    }

    /// Run the requested checks and their prerequisites.
    pub async fn run<S: AsRef<str>>(&self, requested: &[S]) -> VigilResult<RunReport> {
        self.run_with_abort(requested, AbortHandle::new()).await
    }

    /// [`Pipeline::run`] with an externally owned abort handle.
    ///
    /// Only an invalid request is an error. Check failures end up in the
    /// result, and history failures become result warnings.
    pub async fn run_with_abort<S: AsRef<str>>(
        &self,
        requested: &[S],
        abort: AbortHandle,
    ) -> VigilResult<RunReport> {
        let plan = self.resolver.resolve(requested)?;

        let mut scheduler = Scheduler::new(self.config.scheduler_config(), self.checkers.clone())
            .with_abort_handle(abort);
        if let Some(tx) = &self.events {
            scheduler = scheduler.with_events(tx.clone());
        }
        let outcome = scheduler.execute(&plan).await;

        let mut result = ResultAggregator::new().aggregate(&outcome.results, outcome.elapsed);
        let mut record = None;

        if let Some(tracker) = &self.tracker {
            match tracker.baseline().await {
                Ok(baseline) => {
                    let regressions = self.detector.detect(&result.check_results, &baseline);
                    result = result.with_regressions(regressions);
                }
                Err(e) => {
                    warn!(error = %e, "could not load baseline");
                    result = result.with_warning(format!("Regression check skipped: {e}"));
                }
            }

            match tracker.record(&result).await {
                Ok(stored) => record = Some(stored),
                Err(e) => {
                    warn!(error = %e, "could not record run history");
                    result = result.with_warning(format!("Run was not recorded in history: {e}"));
                }
            }
        }

        info!(
            status = %result.overall_status,
            regressions = result.regressions.len(),
            aborted = outcome.aborted,
            "{}",
            result.summary
        );

        Ok(RunReport {
            result,
            record,
            aborted: outcome.aborted,
        })
    }

    /// Render a result with every configured renderer, in registration order.
    pub fn render(&self, result: &SimulationResult) -> VigilResult<Vec<RenderedReport>> {
        self.renderers
            .iter()
            .map(|renderer| {
                Ok(RenderedReport {
                    format: renderer.format_name().to_string(),
                    content: renderer.render(result)?,
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("checkers", &self.checkers)
            .field("history", &self.tracker.is_some())
            .field("renderers", &self.renderers.len())
            .finish_non_exhaustive()
    }
}
