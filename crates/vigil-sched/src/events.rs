//! Scheduler progress events.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use vigil_types::CheckStatus;

/// Progress of a run, emitted in order on the scheduler's event channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    /// A batch is about to dispatch.
    BatchStarted { index: usize, checks: Vec<String> },
    /// A checker was invoked.
    CheckStarted { name: String, batch: usize },
    /// A check reached its final status, including skips.
    CheckCompleted {
        name: String,
        status: CheckStatus,
        duration: Duration,
    },
    /// Dispatching stopped early.
    RunAborted { reason: String, remaining: usize },
    /// The run is over.
    RunFinished {
        elapsed: Duration,
        aborted: bool,
        checks: usize,
    },
}

impl SchedulerEvent {
    /// Whether this is the last event of a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SchedulerEvent::RunFinished { .. })
    }
}
