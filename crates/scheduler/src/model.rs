use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use webpilot_core_types::{ActionRecord, TaskId, TaskSpec, VerificationResult};

/// Lifecycle status of one submitted task.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// One entry of the scheduler's task table. Mutated only by the scheduler
/// and the worker owning the run; immutable once a terminal status is set.
#[derive(Clone, Debug, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub spec: TaskSpec,
    pub status: TaskStatus,
    /// Structured reason for the terminal status ("timeout", loop reason…).
    pub reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Final verdict, attached on the terminal transition.
    pub outcome: Option<VerificationResult>,
    /// Full action history of the run, kept for audit.
    pub history: Vec<ActionRecord>,
}

impl Task {
    pub fn new(spec: TaskSpec) -> Self {
        Self {
            id: spec.id.clone(),
            spec,
            status: TaskStatus::Queued,
            reason: None,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            outcome: None,
            history: Vec::new(),
        }
    }

    /// Serialized evidence document attached to the execution record for
    /// later audit; rendering it into a report is an external concern.
    pub fn evidence_document(&self) -> Value {
        json!({
            "task_id": self.id,
            "description": self.spec.description,
            "status": self.status,
            "reason": self.reason,
            "submitted_at": self.submitted_at,
            "started_at": self.started_at,
            "finished_at": self.finished_at,
            "verification": self.outcome,
            "action_history": self.history,
        })
    }
}

/// Scheduler tuning. `workers` is the admission-gate size N.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Maximum concurrently running execution engines.
    pub workers: usize,
    /// Maximum tasks waiting for admission beyond the running ones.
    pub queue_capacity: usize,
    /// Hard per-task wall-clock budget.
    pub task_timeout: Duration,
    /// How long a timed-out or cancelled run may take to acknowledge before
    /// it is torn down forcibly.
    pub cancel_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            queue_capacity: 64,
            task_timeout: Duration::from_secs(300),
            cancel_grace: Duration::from_secs(5),
        }
    }
}
