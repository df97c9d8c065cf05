use thiserror::Error;
use webpilot_core_types::{CoreError, TaskId};

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Submission beyond admission capacity; never silently dropped.
    #[error("admission queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("unknown task {0}")]
    UnknownTask(TaskId),

    #[error("scheduler internal error: {0}")]
    Internal(String),
}

impl From<SchedulerError> for CoreError {
    fn from(value: SchedulerError) -> Self {
        CoreError::new(value.to_string())
    }
}
