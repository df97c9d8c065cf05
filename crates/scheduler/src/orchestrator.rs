use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use webpilot_core_types::{ProgressEvent, TaskId, TaskSpec};
use webpilot_engine::{EngineConfig, EngineError, ExecutionEngine, RunOutcome, RunStatus,
    REASON_CANCELLED};

use crate::api::RunnerBackend;
use crate::events::EventBus;
use crate::metrics;
use crate::model::TaskStatus;
use crate::runtime::SchedulerRuntime;

const IDLE_POLL: Duration = Duration::from_millis(5);
const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// Owns the dispatch loop: admits queued tasks into worker slots, runs one
/// execution engine per admitted task, and records terminal outcomes.
pub struct Orchestrator {
    runtime: Arc<SchedulerRuntime>,
    backend: Arc<dyn RunnerBackend>,
    engine_config: EngineConfig,
    bus: EventBus,
    progress_tx: broadcast::Sender<ProgressEvent>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(
        runtime: Arc<SchedulerRuntime>,
        backend: Arc<dyn RunnerBackend>,
        engine_config: EngineConfig,
        bus: EventBus,
    ) -> Self {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self {
            runtime,
            backend,
            engine_config,
            bus,
            progress_tx,
            worker: Mutex::new(None),
        }
    }

    /// Start the dispatch loop and the progress forwarder, once.
    pub async fn spawn(&self) {
        let mut guard = self.worker.lock().await;
        if guard.is_some() {
            return;
        }

        let mut progress_rx = self.progress_tx.subscribe();
        let forwarder_bus = self.bus.clone();
        tokio::spawn(async move {
            while let Ok(event) = progress_rx.recv().await {
                forwarder_bus.publish_progress(&event);
            }
        });

        let runtime = Arc::clone(&self.runtime);
        let backend = Arc::clone(&self.backend);
        let engine_config = self.engine_config.clone();
        let bus = self.bus.clone();
        let progress_tx = self.progress_tx.clone();
        let handle = tokio::spawn(async move {
            loop {
                match runtime.next_run().await {
                    Some((id, permit)) => {
                        let runtime = Arc::clone(&runtime);
                        let backend = Arc::clone(&backend);
                        let engine_config = engine_config.clone();
                        let bus = bus.clone();
                        let progress_tx = progress_tx.clone();
                        tokio::spawn(async move {
                            dispatch_run(runtime, backend, engine_config, bus, progress_tx, id)
                                .await;
                            drop(permit);
                        });
                    }
                    None => sleep(IDLE_POLL).await,
                }
            }
        });
        *guard = Some(handle);
    }

    pub async fn submit(&self, spec: TaskSpec) -> Result<TaskId, crate::error::SchedulerError> {
        self.spawn().await;
        let id = self.runtime.submit(spec)?;
        metrics::record_submitted();
        self.bus.publish_status(&id, TaskStatus::Queued);
        debug!(task = %id, pending = self.runtime.pending(), "task admitted");
        Ok(id)
    }

    /// Cooperative cancellation: a queued task is withdrawn immediately; a
    /// running task observes its token at the next state-machine transition.
    pub async fn cancel(&self, id: &TaskId) -> bool {
        if self.runtime.remove_queued(id) {
            self.runtime.finish(
                id,
                TaskStatus::Cancelled,
                Some(REASON_CANCELLED.to_string()),
                None,
                Vec::new(),
            );
            metrics::record_cancelled();
            self.bus.publish_status(id, TaskStatus::Cancelled);
            return true;
        }
        match self.runtime.cancel_token(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.runtime.status(id)
    }

    pub fn task(&self, id: &TaskId) -> Option<crate::model::Task> {
        self.runtime.task(id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<crate::events::TaskEvent> {
        self.bus.subscribe()
    }
}

/// Terminal disposition of one run, before it is written to the table.
struct RunDisposition {
    status: TaskStatus,
    reason: Option<String>,
    outcome: Option<webpilot_core_types::VerificationResult>,
    history: Vec<webpilot_core_types::ActionRecord>,
}

async fn dispatch_run(
    runtime: Arc<SchedulerRuntime>,
    backend: Arc<dyn RunnerBackend>,
    engine_config: EngineConfig,
    bus: EventBus,
    progress_tx: broadcast::Sender<ProgressEvent>,
    id: TaskId,
) {
    let Some(spec) = runtime.spec(&id) else {
        warn!(task = %id, "admitted task vanished from the table");
        return;
    };
    // The queued entry may have been cancelled between pop and dispatch.
    if runtime
        .status(&id)
        .map(|status| status.is_terminal())
        .unwrap_or(true)
    {
        return;
    }

    let token = runtime.register_token(&id);
    runtime.mark_running(&id);
    metrics::record_started();
    bus.publish_status(&id, TaskStatus::Running);

    let task_timeout = runtime.config().task_timeout;
    let cancel_grace = runtime.config().cancel_grace;

    let mut run_fut = Box::pin(run_one(
        backend,
        engine_config,
        spec,
        token.clone(),
        progress_tx,
    ));
    let disposition = tokio::select! {
        result = &mut run_fut => dispose(result),
        _ = sleep(task_timeout) => {
            warn!(task = %id, "task exceeded its hard timeout; cancelling");
            token.cancel();
            match timeout(cancel_grace, &mut run_fut).await {
                Ok(result) => dispose(result),
                Err(_) => {
                    // The run never acknowledged within the grace window;
                    // dropping the future tears the session down.
                    metrics::record_timed_out();
                    RunDisposition {
                        status: TaskStatus::Failed,
                        reason: Some("timeout".to_string()),
                        outcome: None,
                        history: Vec::new(),
                    }
                }
            }
        }
    };

    match disposition.status {
        TaskStatus::Succeeded => metrics::record_succeeded(),
        TaskStatus::Cancelled => metrics::record_cancelled(),
        _ => metrics::record_failed(),
    }
    info!(
        target: "scheduler",
        task = %id,
        status = ?disposition.status,
        reason = disposition.reason.as_deref().unwrap_or(""),
        pending = runtime.pending(),
        "run finished"
    );
    let status = disposition.status;
    runtime.finish(
        &id,
        status,
        disposition.reason,
        disposition.outcome,
        disposition.history,
    );
    bus.publish_status(&id, status);
}

/// One full run: plan once, create the session, execute, release the
/// session on every cooperative path.
async fn run_one(
    backend: Arc<dyn RunnerBackend>,
    engine_config: EngineConfig,
    spec: TaskSpec,
    token: CancellationToken,
    progress_tx: broadcast::Sender<ProgressEvent>,
) -> Result<RunOutcome, EngineError> {
    let plan = backend.plan(&spec).await.map_err(EngineError::planner)?;
    let driver = backend.create_driver().await.map_err(EngineError::driver)?;
    let decider = backend
        .create_decider()
        .await
        .map_err(EngineError::decision)?;

    let mut engine = ExecutionEngine::new(driver, decider, engine_config)
        .with_cancellation(token)
        .with_progress(progress_tx);
    let result = engine.run(&spec, &plan).await;
    if let Err(err) = engine.close_session().await {
        warn!(task = %spec.id, error = %err, "session release failed");
    }
    result
}

fn dispose(result: Result<RunOutcome, EngineError>) -> RunDisposition {
    match result {
        Ok(outcome) => {
            let status = match outcome.status {
                RunStatus::Completed => TaskStatus::Succeeded,
                RunStatus::Failed => TaskStatus::Failed,
                RunStatus::Aborted if outcome.reason == REASON_CANCELLED => TaskStatus::Cancelled,
                RunStatus::Aborted => TaskStatus::Failed,
            };
            RunDisposition {
                status,
                reason: Some(outcome.reason),
                outcome: outcome.verdict,
                history: outcome.history,
            }
        }
        Err(err) => RunDisposition {
            status: TaskStatus::Failed,
            reason: Some(err.to_string()),
            outcome: None,
            history: Vec::new(),
        },
    }
}
