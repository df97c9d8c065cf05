use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use chrono::Utc;
use webpilot_core_types::{ActionRecord, TaskId, TaskSpec, VerificationResult};

use crate::error::SchedulerError;
use crate::model::{SchedulerConfig, Task, TaskStatus};

/// Shared admission and lifecycle state.
///
/// The task table is the only state touched by more than one worker; each
/// task record itself is written only by the worker owning that run (or by
/// the submitting/cancelling caller while the task is still queued).
#[derive(Debug)]
pub struct SchedulerRuntime {
    table: DashMap<TaskId, Task>,
    queue: Mutex<VecDeque<TaskId>>,
    slots: Arc<Semaphore>,
    tokens: DashMap<TaskId, CancellationToken>,
    config: SchedulerConfig,
}

impl SchedulerRuntime {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            table: DashMap::new(),
            queue: Mutex::new(VecDeque::new()),
            slots: Arc::new(Semaphore::new(config.workers.max(1))),
            tokens: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Admit a task or reject it with an explicit capacity error.
    pub fn submit(&self, spec: TaskSpec) -> Result<TaskId, SchedulerError> {
        let mut queue = self.queue.lock();
        if queue.len() >= self.config.queue_capacity {
            return Err(SchedulerError::QueueFull {
                capacity: self.config.queue_capacity,
            });
        }
        let task = Task::new(spec);
        let id = task.id.clone();
        self.table.insert(id.clone(), task);
        queue.push_back(id.clone());
        Ok(id)
    }

    /// Next admitted run in FIFO order, once a worker slot frees. Returns
    /// None when the queue is empty or the popped entry was cancelled while
    /// a slot was being acquired.
    pub async fn next_run(&self) -> Option<(TaskId, OwnedSemaphorePermit)> {
        if self.queue.lock().is_empty() {
            return None;
        }
        let permit = self.slots.clone().acquire_owned().await.ok()?;
        let id = self.queue.lock().pop_front()?;
        Some((id, permit))
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn spec(&self, id: &TaskId) -> Option<TaskSpec> {
        self.table.get(id).map(|task| task.spec.clone())
    }

    pub fn status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.table.get(id).map(|task| task.status)
    }

    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.table.get(id).map(|task| task.clone())
    }

    /// Register the cooperative cancellation token for a starting run.
    pub fn register_token(&self, id: &TaskId) -> CancellationToken {
        let token = CancellationToken::new();
        self.tokens.insert(id.clone(), token.clone());
        token
    }

    pub fn cancel_token(&self, id: &TaskId) -> Option<CancellationToken> {
        self.tokens.get(id).map(|token| token.clone())
    }

    /// Drop a task from the admission queue. Returns whether it was queued.
    pub fn remove_queued(&self, id: &TaskId) -> bool {
        let mut queue = self.queue.lock();
        if let Some(position) = queue.iter().position(|queued| queued == id) {
            queue.remove(position);
            true
        } else {
            false
        }
    }

    pub fn mark_running(&self, id: &TaskId) {
        if let Some(mut task) = self.table.get_mut(id) {
            task.status = TaskStatus::Running;
            task.started_at = Some(Utc::now());
        }
    }

    /// Terminal transition: set status/reason and attach the evidence.
    /// A record already terminal is left untouched.
    pub fn finish(
        &self,
        id: &TaskId,
        status: TaskStatus,
        reason: Option<String>,
        outcome: Option<VerificationResult>,
        history: Vec<ActionRecord>,
    ) {
        if let Some(mut task) = self.table.get_mut(id) {
            if task.status.is_terminal() {
                return;
            }
            task.status = status;
            task.reason = reason;
            task.outcome = outcome;
            task.history = history;
            task.finished_at = Some(Utc::now());
        }
        self.tokens.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime_with(workers: usize, capacity: usize) -> SchedulerRuntime {
        SchedulerRuntime::new(SchedulerConfig {
            workers,
            queue_capacity: capacity,
            ..SchedulerConfig::default()
        })
    }

    fn spec(label: &str) -> TaskSpec {
        TaskSpec::new(label, "https://app")
    }

    #[tokio::test]
    async fn submissions_are_fifo() {
        let runtime = runtime_with(2, 8);
        let first = runtime.submit(spec("a")).unwrap();
        let second = runtime.submit(spec("b")).unwrap();

        let (id, _permit) = runtime.next_run().await.unwrap();
        assert_eq!(id, first);
        let (id, _permit2) = runtime.next_run().await.unwrap();
        assert_eq!(id, second);
        assert_eq!(runtime.pending(), 0);
    }

    #[tokio::test]
    async fn overflow_is_rejected_explicitly() {
        let runtime = runtime_with(1, 2);
        runtime.submit(spec("a")).unwrap();
        runtime.submit(spec("b")).unwrap();
        let err = runtime.submit(spec("c")).unwrap_err();
        assert!(matches!(err, SchedulerError::QueueFull { capacity: 2 }));
    }

    #[tokio::test]
    async fn cancelled_queued_task_never_dispatches() {
        let runtime = runtime_with(1, 8);
        let id = runtime.submit(spec("a")).unwrap();
        assert!(runtime.remove_queued(&id));
        assert!(runtime.next_run().await.is_none());
        assert!(!runtime.remove_queued(&id));
    }

    #[tokio::test]
    async fn slots_bound_concurrent_runs() {
        let runtime = runtime_with(2, 8);
        runtime.submit(spec("a")).unwrap();
        runtime.submit(spec("b")).unwrap();
        runtime.submit(spec("c")).unwrap();

        let first = runtime.next_run().await.unwrap();
        let second = runtime.next_run().await.unwrap();
        assert_eq!(runtime.available_slots(), 0);

        // Third run only dispatches once a permit is returned.
        drop(first.1);
        let third = runtime.next_run().await.unwrap();
        assert_eq!(third.0, runtime.task(&third.0).unwrap().id);
        drop(second);
        drop(third);
    }

    #[tokio::test]
    async fn finish_is_write_once() {
        let runtime = runtime_with(1, 8);
        let id = runtime.submit(spec("a")).unwrap();
        runtime.mark_running(&id);
        runtime.finish(&id, TaskStatus::Cancelled, Some("cancelled".into()), None, vec![]);
        runtime.finish(&id, TaskStatus::Failed, Some("late".into()), None, vec![]);
        let task = runtime.task(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert_eq!(task.reason.as_deref(), Some("cancelled"));
    }
}
