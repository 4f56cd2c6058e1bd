//! Bounded-parallel execution of an [`ExecutionPlan`].
//!
//! Batches run strictly in order. Within a batch, parallelizable checks share
//! a worker pool of `max_parallelism` permits; exclusive checks run one at a
//! time once the pool has drained. A check whose prerequisite failed or timed
//! out is never dispatched.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use vigil_types::{Check, CheckResult, CheckStatus};

use crate::checker::{AbortHandle, CheckContext, Checker, CheckerSet};
use crate::events::SchedulerEvent;
use crate::resolver::ExecutionPlan;

/// Skip reason for checks left undispatched by an abort.
pub const ABORT_REASON: &str = "run aborted";

/// Skip reason for checks left undispatched by the run deadline.
pub const DEADLINE_REASON: &str = "run deadline exceeded";

type EventSender = Option<mpsc::UnboundedSender<SchedulerEvent>>;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of checks running at once. Values below 1 mean 1.
    pub max_parallelism: usize,

    /// Overall deadline, checked at batch boundaries.
    pub run_timeout: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_parallelism: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            run_timeout: None,
        }
    }
}

impl SchedulerConfig {
    pub fn with_max_parallelism(mut self, max_parallelism: usize) -> Self {
        self.max_parallelism = max_parallelism;
        self
    }

    pub fn with_run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = Some(run_timeout);
        self
    }

    /// Pool size actually used.
    pub fn effective_parallelism(&self) -> usize {
        self.max_parallelism.max(1)
    }
}

/// What a plan execution produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    /// One result per planned check.
    pub results: BTreeMap<String, CheckResult>,

    /// Wall-clock time from the first dispatch to the end of the last batch.
    pub elapsed: Duration,

    /// Whether an abort or the run deadline stopped dispatching.
    pub aborted: bool,
}

impl ExecutionOutcome {
    /// Status of a check, if it is part of the outcome.
    pub fn status_of(&self, name: &str) -> Option<CheckStatus> {
        self.results.get(name).map(|r| r.status)
    }
}

/// Executes plans against a set of checkers.
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    checkers: CheckerSet,
    abort: AbortHandle,
    events: EventSender,
}

impl Scheduler {
    /// Create a scheduler.
    pub fn new(config: SchedulerConfig, checkers: CheckerSet) -> Self {
        Self {
            config,
            checkers,
            abort: AbortHandle::new(),
            events: None,
        }
    }

    /// Publish progress events on `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Use an externally owned abort handle.
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    /// Handle that stops dispatching when raised.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Execute every batch of the plan.
    ///
    /// Never fails: checker errors, panics and timeouts all become results.
    pub async fn execute(&self, plan: &ExecutionPlan) -> ExecutionOutcome {
        let start = Instant::now();
        // A deadline past the clock's range is no deadline.
        let deadline = self.config.run_timeout.and_then(|t| start.checked_add(t));
        let mut results: BTreeMap<String, CheckResult> = BTreeMap::new();
        // Blocked check -> the failed check that blocked it.
        let mut failed_roots: rustc_hash::FxHashMap<String, String> =
            rustc_hash::FxHashMap::default();
        let mut stop_reason: Option<&'static str> = None;

        info!(
            checks = plan.check_count(),
            batches = plan.len(),
            max_parallelism = self.config.effective_parallelism(),
            "Starting check run"
        );

        for (index, batch) in plan.batches().iter().enumerate() {
            if stop_reason.is_none() {
                if self.abort.is_aborted() {
                    stop_reason = Some(ABORT_REASON);
                } else if deadline.is_some_and(|d| Instant::now() >= d) {
                    stop_reason = Some(DEADLINE_REASON);
                }
                if let Some(reason) = stop_reason {
                    let remaining = plan.check_count() - results.len();
                    warn!(remaining, "Stopping run: {}", reason);
                    self.emit(SchedulerEvent::RunAborted {
                        reason: reason.to_string(),
                        remaining,
                    });
                }
            }

            if let Some(reason) = stop_reason {
                for name in batch {
                    self.record(&mut results, CheckResult::skipped(name, reason));
                }
                continue;
            }

            self.emit(SchedulerEvent::BatchStarted {
                index,
                checks: batch.clone(),
            });
            info!(batch = index, checks = batch.len(), "Dispatching batch");

            let mut parallel = Vec::new();
            let mut exclusive = Vec::new();
            for name in batch {
                let blocked_by = plan
                    .dependencies_of(name)
                    .iter()
                    .find_map(|dep| failed_roots.get(dep).cloned());
                if let Some(root) = blocked_by {
                    debug!(check = %name, prerequisite = %root, "Skipping blocked check");
                    let reason = format!("prerequisite '{root}' failed");
                    failed_roots.insert(name.clone(), root);
                    self.record(&mut results, CheckResult::skipped(name, reason));
                    continue;
                }
                match plan.check(name) {
                    Some(check) if check.parallelizable => parallel.push(check.clone()),
                    Some(check) => exclusive.push(check.clone()),
                    None => {}
                }
            }

            let mut finished = self.run_group(parallel, index).await;
            for check in exclusive {
                if self.abort.is_aborted() {
                    let result = CheckResult::skipped(&check.name, ABORT_REASON);
                    self.record(&mut results, result);
                    continue;
                }
                finished.extend(self.run_group(vec![check], index).await);
            }

            for result in finished {
                if result.status.is_blocking() {
                    failed_roots.insert(result.name.clone(), result.name.clone());
                }
                results.insert(result.name.clone(), result);
            }
        }

        if stop_reason.is_none() && self.abort.is_aborted() {
            stop_reason = Some(ABORT_REASON);
            self.emit(SchedulerEvent::RunAborted {
                reason: ABORT_REASON.to_string(),
                remaining: 0,
            });
        }

        let elapsed = start.elapsed();
        let aborted = stop_reason.is_some();
        info!(
            checks = results.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            aborted,
            "Check run finished"
        );
        self.emit(SchedulerEvent::RunFinished {
            elapsed,
            aborted,
            checks: results.len(),
        });

        ExecutionOutcome {
            results,
            elapsed,
            aborted,
        }
    }

    /// Run checks concurrently, at most `max_parallelism` at a time, and wait
    /// for all of them.
    async fn run_group(&self, checks: Vec<Check>, batch: usize) -> Vec<CheckResult> {
        if checks.is_empty() {
            return Vec::new();
        }

        let permits = self.config.effective_parallelism().min(checks.len());
        let pool = Arc::new(Semaphore::new(permits));
        let mut names = Vec::with_capacity(checks.len());
        let mut handles = Vec::with_capacity(checks.len());

        for check in checks {
            names.push(check.name.clone());
            let pool = Arc::clone(&pool);
            let checker = self.checkers.get(&check.name);
            let abort = self.abort.signal();
            let events = self.events.clone();

            handles.push(tokio::spawn(async move {
                let result = match pool.acquire_owned().await {
                    Err(_) => CheckResult::fault(&check.name, "Worker pool closed"),
                    Ok(_permit) if abort.is_cancelled() => {
                        CheckResult::skipped(&check.name, ABORT_REASON)
                    }
                    Ok(_permit) => run_check(checker, check, batch, &events).await,
                };
                send(&events, completed_event(&result));
                result
            }));
        }

        let joined = futures::future::join_all(handles).await;
        names
            .into_iter()
            .zip(joined)
            .map(|(name, joined)| match joined {
                Ok(result) => result,
                Err(err) => {
                    let message = join_failure_message(err);
                    warn!(check = %name, "{}", message);
                    let result = CheckResult::fault(name, message);
                    self.emit(completed_event(&result));
                    result
                }
            })
            .collect()
    }

    fn record(&self, results: &mut BTreeMap<String, CheckResult>, result: CheckResult) {
        self.emit(completed_event(&result));
        results.insert(result.name.clone(), result);
    }

    fn emit(&self, event: SchedulerEvent) {
        send(&self.events, event);
    }
}

/// Invoke one checker under its timeout.
async fn run_check(
    checker: Option<Arc<dyn Checker>>,
    check: Check,
    batch: usize,
    events: &EventSender,
) -> CheckResult {
    let name = check.name.clone();
    let Some(checker) = checker else {
        warn!(check = %name, "No checker registered");
        return CheckResult::fault(&name, format!("No checker registered for check '{name}'"));
    };

    send(
        events,
        SchedulerEvent::CheckStarted {
            name: name.clone(),
            batch,
        },
    );
    debug!(check = %name, timeout_ms = check.timeout.as_millis() as u64, "Starting check");

    let timeout = check.timeout;
    let cancel = AbortHandle::new();
    let ctx = CheckContext {
        check,
        cancel: cancel.signal(),
    };
    let started = Instant::now();

    match tokio::time::timeout(timeout, checker.run(ctx)).await {
        Ok(Ok(result)) => result.with_name(name).with_duration(started.elapsed()),
        Ok(Err(e)) => {
            warn!(check = %name, "Checker fault: {}", e);
            CheckResult::fault(name, e.to_string()).with_duration(started.elapsed())
        }
        Err(_) => {
            // The checker future is dropped here; the signal reaches anything
            // it spawned.
            cancel.abort();
            warn!(check = %name, "Check timed out after {:?}", timeout);
            CheckResult::timed_out(name, timeout)
        }
    }
}

fn send(events: &EventSender, event: SchedulerEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is listening.
        let _ = tx.send(event);
    }
}

fn completed_event(result: &CheckResult) -> SchedulerEvent {
    SchedulerEvent::CheckCompleted {
        name: result.name.clone(),
        status: result.status,
        duration: result.duration,
    }
}

fn join_failure_message(err: JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        format!("Checker panicked: {detail}")
    } else {
        format!("Checker task failed: {err}")
    }
}
