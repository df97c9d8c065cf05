//! Publish/subscribe notification channel for task lifecycle and progress.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use webpilot_core_types::{ActionKind, ProgressEvent, TaskId};

use crate::model::TaskStatus;

#[derive(Clone, Debug, Serialize)]
pub struct TaskEvent {
    pub task_id: TaskId,
    pub kind: TaskEventKind,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum TaskEventKind {
    Status { status: TaskStatus },
    Progress {
        step_index: Option<usize>,
        cycles_used: u32,
        last_action: Option<ActionKind>,
    },
}

/// In-memory broadcast bus; delivery is best-effort and lagging
/// subscribers drop the oldest events.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<TaskEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish_status(&self, task_id: &TaskId, status: TaskStatus) {
        let _ = self.sender.send(TaskEvent {
            task_id: task_id.clone(),
            kind: TaskEventKind::Status { status },
            at: Utc::now(),
        });
    }

    pub fn publish_progress(&self, progress: &ProgressEvent) {
        let _ = self.sender.send(TaskEvent {
            task_id: progress.task_id.clone(),
            kind: TaskEventKind::Progress {
                step_index: progress.step_index,
                cycles_used: progress.cycles_used,
                last_action: progress.last_action,
            },
            at: progress.at,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_events_reach_subscribers() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let id = TaskId::new();
        bus.publish_status(&id, TaskStatus::Running);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.task_id, id);
        assert!(matches!(
            event.kind,
            TaskEventKind::Status {
                status: TaskStatus::Running
            }
        ));
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_harmless() {
        let bus = EventBus::new(8);
        bus.publish_status(&TaskId::new(), TaskStatus::Queued);
    }
}
