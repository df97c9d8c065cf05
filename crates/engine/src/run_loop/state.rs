//! Per-run state and terminal outcome types.

use serde::{Deserialize, Serialize};
use webpilot_core_types::{ActionRecord, PageState, TaskId, VerificationResult};

/// Terminal status of one execution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The verifier returned Success.
    Completed,
    /// Exhaustion, or the verifier returned Failure.
    Failed,
    /// Loop escalation concluded "quit", the decision source quit, or the
    /// run was cancelled.
    Aborted,
}

/// Final result of one run, extracted before the run state is discarded.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub reason: String,
    /// Present whenever the verifier was consulted on the exit path.
    pub verdict: Option<VerificationResult>,
    /// Full, append-only action history of the run.
    pub history: Vec<ActionRecord>,
    pub final_state: PageState,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Completed)
    }
}

/// Mutable context of a run in flight. Created when the engine starts a
/// task, discarded when the run terminates.
#[derive(Debug)]
pub struct RunState {
    pub task_id: TaskId,
    pub step_cursor: usize,
    pub adaptive_cycles_used: u32,
    pub loop_escalations: u32,
    pub action_history: Vec<ActionRecord>,
    pub completed: bool,
}

impl RunState {
    pub fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            step_cursor: 0,
            adaptive_cycles_used: 0,
            loop_escalations: 0,
            action_history: Vec::new(),
            completed: false,
        }
    }

    /// Trailing slice of the history, newest last.
    pub fn tail(&self, len: usize) -> &[ActionRecord] {
        let start = self.action_history.len().saturating_sub(len);
        &self.action_history[start..]
    }
}

/// Flow control produced by one interact/adaptive iteration.
#[derive(Debug)]
pub(crate) enum StepFlow {
    Continue,
    /// The decision source signalled Done; consult the verifier now.
    VerifyNow,
    Abort(String),
}
