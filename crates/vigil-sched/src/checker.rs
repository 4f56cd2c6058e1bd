//! Checker interface.
//!
//! A checker wraps one external tool and turns its outcome into a
//! [`CheckResult`]. The scheduler never calls tools directly; it looks up the
//! checker registered for each planned check in a [`CheckerSet`].

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use vigil_types::{Check, CheckResult};

use crate::error::CheckerError;

/// Cooperative cancellation flag observed by a running check.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that is never raised.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until cancellation is requested.
    ///
    /// Pends forever if the owning handle is dropped without aborting.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|raised| *raised).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Owner side of a [`CancelSignal`].
#[derive(Debug, Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    /// Create a handle that has not been raised.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the signal. Idempotent.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the signal has been raised.
    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }

    /// A new observer of this handle.
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a checker receives for one execution.
#[derive(Debug, Clone)]
pub struct CheckContext {
    /// The check being executed.
    pub check: Check,

    /// Raised when the check times out and its result is abandoned.
    pub cancel: CancelSignal,
}

impl CheckContext {
    /// Name of the check being executed.
    pub fn name(&self) -> &str {
        &self.check.name
    }
}

/// Executes one kind of check.
///
/// Return `Ok` with a `FAILURE` result when the checked code is broken, and
/// `Err` only when the tool itself cannot run.
#[async_trait]
pub trait Checker: Send + Sync {
    /// Run the check.
    async fn run(&self, ctx: CheckContext) -> Result<CheckResult, CheckerError>;
}

/// Adapts an async closure into a [`Checker`].
pub struct FnChecker<F> {
    f: F,
}

impl<F, Fut> FnChecker<F>
where
    F: Fn(CheckContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CheckResult, CheckerError>> + Send,
{
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Checker for FnChecker<F>
where
    F: Fn(CheckContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CheckResult, CheckerError>> + Send,
{
    async fn run(&self, ctx: CheckContext) -> Result<CheckResult, CheckerError> {
        (self.f)(ctx).await
    }
}

/// Checkers keyed by check name.
#[derive(Clone, Default)]
pub struct CheckerSet {
    checkers: rustc_hash::FxHashMap<String, Arc<dyn Checker>>,
}

impl CheckerSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a checker, replacing any previous one for the same name.
    pub fn insert(&mut self, name: impl Into<String>, checker: Arc<dyn Checker>) {
        self.checkers.insert(name.into(), checker);
    }

    /// Builder form of [`CheckerSet::insert`].
    pub fn with(mut self, name: impl Into<String>, checker: impl Checker + 'static) -> Self {
        self.insert(name, Arc::new(checker));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Checker>> {
        self.checkers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.checkers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }
}

impl std::fmt::Debug for CheckerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.checkers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("CheckerSet").field("checkers", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_types::{CheckKind, CheckStatus};

    #[tokio::test]
    async fn test_fn_checker() {
        let checker = FnChecker::new(|ctx: CheckContext| async move {
            Ok(CheckResult::success(ctx.name()))
        });
        let ctx = CheckContext {
            check: Check::new("lint", CheckKind::Quality),
            cancel: CancelSignal::never(),
        };
        let result = checker.run(ctx).await.unwrap();
        assert_eq!(result.name, "lint");
        assert_eq!(result.status, CheckStatus::Success);
    }

    #[tokio::test]
    async fn test_abort_handle_signals_observers() {
        let handle = AbortHandle::new();
        let signal = handle.signal();
        assert!(!signal.is_cancelled());

        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.cancelled().await }
        });
        handle.abort();
        waiter.await.unwrap();

        assert!(signal.is_cancelled());
        assert!(handle.is_aborted());
        // Observers created after the abort see it too.
        assert!(handle.signal().is_cancelled());
    }

    #[test]
    fn test_checker_set() {
        let set = CheckerSet::new().with(
            "lint",
            FnChecker::new(|ctx: CheckContext| async move { Ok(CheckResult::success(ctx.name())) }),
        );
        assert!(set.contains("lint"));
        assert!(set.get("test").is_none());
        assert_eq!(set.len(), 1);
    }
}
