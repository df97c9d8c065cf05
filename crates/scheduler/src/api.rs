use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use webpilot_core_types::{CoreError, StepPlan, TaskId, TaskSpec};
use webpilot_engine::{BrowserDriver, DecisionSource, EngineConfig};

use crate::error::SchedulerError;
use crate::events::{EventBus, TaskEvent};
use crate::model::{SchedulerConfig, Task, TaskStatus};
use crate::orchestrator::Orchestrator;
use crate::runtime::SchedulerRuntime;

/// Factory for the per-run collaborators. Every admitted task gets its own
/// browser session and decision source; sessions are never shared.
#[async_trait]
pub trait RunnerBackend: Send + Sync {
    async fn create_driver(&self) -> Result<Box<dyn BrowserDriver>, CoreError>;
    async fn create_decider(&self) -> Result<Box<dyn DecisionSource>, CoreError>;
    /// Invoked once per run, before the engine state machine begins.
    async fn plan(&self, task: &TaskSpec) -> Result<StepPlan, CoreError>;
}

/// Caller-facing scheduler surface.
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    /// Admit a task; rejects with [`SchedulerError::QueueFull`] beyond
    /// admission capacity.
    async fn submit(&self, spec: TaskSpec) -> Result<TaskId, SchedulerError>;

    /// Best-effort cooperative cancellation; returns whether the task was
    /// known and non-terminal.
    async fn cancel(&self, id: &TaskId) -> bool;

    fn status(&self, id: &TaskId) -> Option<TaskStatus>;

    /// Full task record including the attached evidence, once terminal.
    fn task(&self, id: &TaskId) -> Option<Task>;

    fn subscribe(&self) -> broadcast::Receiver<TaskEvent>;
}

pub struct SchedulerService {
    orchestrator: Orchestrator,
}

impl SchedulerService {
    pub fn new(
        config: SchedulerConfig,
        engine_config: EngineConfig,
        backend: Arc<dyn RunnerBackend>,
    ) -> Self {
        let runtime = Arc::new(SchedulerRuntime::new(config));
        let bus = EventBus::new(256);
        let orchestrator = Orchestrator::new(runtime, backend, engine_config, bus);
        Self { orchestrator }
    }

    pub async fn start(&self) {
        self.orchestrator.spawn().await;
    }
}

#[async_trait]
impl TaskScheduler for SchedulerService {
    async fn submit(&self, spec: TaskSpec) -> Result<TaskId, SchedulerError> {
        self.orchestrator.submit(spec).await
    }

    async fn cancel(&self, id: &TaskId) -> bool {
        self.orchestrator.cancel(id).await
    }

    fn status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.orchestrator.status(id)
    }

    fn task(&self, id: &TaskId) -> Option<Task> {
        self.orchestrator.task(id)
    }

    fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.orchestrator.subscribe()
    }
}

#[async_trait]
impl<S> TaskScheduler for Arc<S>
where
    S: TaskScheduler + ?Sized,
{
    async fn submit(&self, spec: TaskSpec) -> Result<TaskId, SchedulerError> {
        (**self).submit(spec).await
    }

    async fn cancel(&self, id: &TaskId) -> bool {
        (**self).cancel(id).await
    }

    fn status(&self, id: &TaskId) -> Option<TaskStatus> {
        (**self).status(id)
    }

    fn task(&self, id: &TaskId) -> Option<Task> {
        (**self).task(id)
    }

    fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        (**self).subscribe()
    }
}
