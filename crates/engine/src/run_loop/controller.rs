use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use webpilot_core_types::{
    ActionSpec, CoreError, Decision, PageState, ProgressEvent, ProgressSignal, StepKind, StepPlan,
    TaskSpec, TerminalSignal,
};

use super::config::EngineConfig;
use super::state::{RunOutcome, RunState, RunStatus, StepFlow};
use crate::errors::EngineError;
use crate::loop_detect::LoopDetector;
use crate::ports::{BrowserDriver, DecisionSource};
use crate::validator::run_validated;
use crate::verdict;

/// Reason attached to runs aborted by cooperative cancellation. The
/// scheduler matches on it to distinguish Cancelled from other aborts.
pub const REASON_CANCELLED: &str = "cancelled";

/// One task's orchestrator. Owns its browser session and decision source
/// exclusively for the duration of the run; nothing here is shared across
/// tasks.
pub struct ExecutionEngine {
    driver: Box<dyn BrowserDriver>,
    decider: Box<dyn DecisionSource>,
    config: EngineConfig,
    detector: LoopDetector,
    cancel: CancellationToken,
    progress: Option<broadcast::Sender<ProgressEvent>>,
    session_closed: bool,
}

impl ExecutionEngine {
    pub fn new(
        driver: Box<dyn BrowserDriver>,
        decider: Box<dyn DecisionSource>,
        config: EngineConfig,
    ) -> Self {
        let detector = LoopDetector::new(config.loop_window);
        Self {
            driver,
            decider,
            config,
            detector,
            cancel: CancellationToken::new(),
            progress: None,
            session_closed: false,
        }
    }

    /// Use an externally owned cancellation token (the scheduler's per-task
    /// token).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Attach a progress event sender; delivery is best-effort.
    pub fn with_progress(mut self, sender: broadcast::Sender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Release the browser session. Idempotent; every cooperative exit path
    /// goes through here exactly once.
    pub async fn close_session(&mut self) -> Result<(), CoreError> {
        if self.session_closed {
            return Ok(());
        }
        self.session_closed = true;
        self.driver.close().await
    }

    /// Execute one task to a terminal outcome.
    pub async fn run(
        &mut self,
        task: &TaskSpec,
        plan: &StepPlan,
    ) -> Result<RunOutcome, EngineError> {
        info!(task = %task.id, steps = plan.len(), "starting execution run");
        let mut state = RunState::new(task.id.clone());
        let mut last_state = PageState::default();

        for step in &plan.steps {
            if self.cancel.is_cancelled() {
                return Ok(outcome(
                    RunStatus::Aborted,
                    REASON_CANCELLED,
                    None,
                    state,
                    last_state,
                ));
            }
            state.step_cursor = step.index;
            debug!(task = %task.id, step = step.index, kind = ?step.kind, "plan step");

            match step.kind {
                StepKind::Navigate => {
                    let url = step
                        .target
                        .clone()
                        .unwrap_or_else(|| task.target_context.clone());
                    last_state = self.navigate(&url, &mut state, &last_state).await?;
                }
                StepKind::Authenticate => {
                    // Credential flows are an external collaborator; the
                    // engine only surfaces the login page and clears
                    // transient obstructions before moving on.
                    if let Some(url) = step.target.clone() {
                        last_state = self.navigate(&url, &mut state, &last_state).await?;
                    }
                    let _ = self
                        .driver
                        .dismiss_transient_overlays()
                        .await
                        .map_err(EngineError::driver)?;
                }
                StepKind::Observe => {
                    let _ = self
                        .driver
                        .dismiss_transient_overlays()
                        .await
                        .map_err(EngineError::driver)?;
                    let (_, page) = self.driver.observe().await.map_err(EngineError::driver)?;
                    last_state = page;
                }
                StepKind::Interact => {
                    match self.interact(task, &mut state, &mut last_state).await? {
                        StepFlow::Continue => {}
                        StepFlow::VerifyNow => {
                            let verdict =
                                verdict::verify(task, &last_state, &state.action_history);
                            if verdict.is_success() {
                                return Ok(completed(state, last_state, verdict));
                            }
                            debug!(
                                task = %task.id,
                                "decision source reported done but verification failed; continuing"
                            );
                        }
                        StepFlow::Abort(reason) => {
                            return Ok(outcome(
                                RunStatus::Aborted,
                                reason,
                                None,
                                state,
                                last_state,
                            ));
                        }
                    }
                }
                StepKind::Verify => {
                    let verdict = verdict::verify(task, &last_state, &state.action_history);
                    if verdict.is_success() {
                        return Ok(completed(state, last_state, verdict));
                    }
                    debug!(task = %task.id, reasons = ?verdict.reasons, "planned verification not yet satisfied");
                }
            }
            self.emit_progress(&state, Some(step.index));
        }

        // Plan exhausted; check whether the walked steps already suffice.
        let verdict = verdict::verify(task, &last_state, &state.action_history);
        if verdict.is_success() {
            return Ok(completed(state, last_state, verdict));
        }

        // Adaptive exploration: bounded observe-decide-act-validate cycles,
        // consulting the verifier after each one.
        while state.adaptive_cycles_used < self.config.max_adaptive_cycles {
            if self.cancel.is_cancelled() {
                return Ok(outcome(
                    RunStatus::Aborted,
                    REASON_CANCELLED,
                    None,
                    state,
                    last_state,
                ));
            }
            state.adaptive_cycles_used += 1;
            debug!(
                task = %task.id,
                cycle = state.adaptive_cycles_used,
                limit = self.config.max_adaptive_cycles,
                "adaptive cycle"
            );

            match self.interact(task, &mut state, &mut last_state).await? {
                StepFlow::Continue | StepFlow::VerifyNow => {}
                StepFlow::Abort(reason) => {
                    return Ok(outcome(
                        RunStatus::Aborted,
                        reason,
                        None,
                        state,
                        last_state,
                    ));
                }
            }

            let verdict = verdict::verify(task, &last_state, &state.action_history);
            if verdict.is_success() {
                return Ok(completed(state, last_state, verdict));
            }
            self.emit_progress(&state, None);
        }

        let verdict = verdict::verify(task, &last_state, &state.action_history);
        warn!(
            task = %task.id,
            cycles = state.adaptive_cycles_used,
            "adaptive cycle budget exhausted without verified success"
        );
        Ok(outcome(
            RunStatus::Failed,
            "exhausted adaptive cycles without verified success",
            Some(verdict),
            state,
            last_state,
        ))
    }

    async fn navigate(
        &mut self,
        url: &str,
        state: &mut RunState,
        before: &PageState,
    ) -> Result<PageState, EngineError> {
        let after = self.driver.navigate(url).await.map_err(EngineError::driver)?;
        let spec = ActionSpec::navigate(url);
        state
            .action_history
            .push(webpilot_core_types::ActionRecord::observed(
                &spec, before, &after, true,
            ));
        Ok(after)
    }

    /// One observe-decide-act-validate iteration, with the periodic loop
    /// check afterwards.
    async fn interact(
        &mut self,
        task: &TaskSpec,
        state: &mut RunState,
        last_state: &mut PageState,
    ) -> Result<StepFlow, EngineError> {
        if self.cancel.is_cancelled() {
            return Ok(StepFlow::Abort(REASON_CANCELLED.to_string()));
        }
        let (screenshot, page) = self.driver.observe().await.map_err(EngineError::driver)?;
        *last_state = page;

        if self.cancel.is_cancelled() {
            return Ok(StepFlow::Abort(REASON_CANCELLED.to_string()));
        }
        let decision = self
            .decider
            .decide(
                &screenshot,
                &task.description,
                state.tail(self.config.history_tail),
            )
            .await
            .map_err(EngineError::decision)?;

        match decision {
            Decision::Terminal(TerminalSignal::Done) => Ok(StepFlow::VerifyNow),
            Decision::Terminal(TerminalSignal::Quit) => {
                Ok(StepFlow::Abort("decision source quit".to_string()))
            }
            Decision::Act(spec) => {
                let validated =
                    run_validated(self.driver.as_mut(), &spec, self.config.action_attempts)
                        .await?;
                *last_state = validated.after;
                state.action_history.push(validated.record);
                if self.config.settle_delay_ms > 0 {
                    sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
                }
                self.emit_progress(state, None);
                self.loop_check(task, state).await
            }
        }
    }

    /// Periodic repetition check plus the bounded stuck-or-progress
    /// escalation.
    async fn loop_check(
        &mut self,
        task: &TaskSpec,
        state: &mut RunState,
    ) -> Result<StepFlow, EngineError> {
        if !self
            .detector
            .check_due(state.action_history.len(), self.config.loop_check_interval)
        {
            return Ok(StepFlow::Continue);
        }
        let Some(signal) = self.detector.detect(&state.action_history) else {
            return Ok(StepFlow::Continue);
        };
        warn!(
            task = %state.task_id,
            rule = ?signal.rule,
            reason = %signal.reason,
            escalations = state.loop_escalations,
            "loop detected"
        );

        if state.loop_escalations >= self.config.max_loop_escalations {
            return Ok(StepFlow::Abort(format!(
                "loop persisted after {} escalations: {}",
                state.loop_escalations, signal.reason
            )));
        }
        state.loop_escalations += 1;

        if self.cancel.is_cancelled() {
            return Ok(StepFlow::Abort(REASON_CANCELLED.to_string()));
        }
        let answer = self
            .decider
            .check_progress(&task.description, state.tail(self.detector.window()))
            .await
            .map_err(EngineError::decision)?;
        match answer {
            ProgressSignal::Quit => Ok(StepFlow::Abort(format!(
                "decision source confirmed stuck: {}",
                signal.reason
            ))),
            ProgressSignal::Continue => {
                debug!(task = %state.task_id, "decision source reports progress; continuing");
                Ok(StepFlow::Continue)
            }
        }
    }

    fn emit_progress(&self, state: &RunState, step_index: Option<usize>) {
        if let Some(sender) = &self.progress {
            let event = ProgressEvent {
                task_id: state.task_id.clone(),
                step_index,
                cycles_used: state.adaptive_cycles_used,
                last_action: state.action_history.last().map(|record| record.kind),
                at: Utc::now(),
            };
            let _ = sender.send(event);
        }
    }
}

fn completed(
    mut state: RunState,
    final_state: PageState,
    verdict: webpilot_core_types::VerificationResult,
) -> RunOutcome {
    state.completed = true;
    info!(task = %state.task_id, actions = state.action_history.len(), "run verified successful");
    outcome(
        RunStatus::Completed,
        "verified successful",
        Some(verdict),
        state,
        final_state,
    )
}

fn outcome(
    status: RunStatus,
    reason: impl Into<String>,
    verdict: Option<webpilot_core_types::VerificationResult>,
    state: RunState,
    final_state: PageState,
) -> RunOutcome {
    RunOutcome {
        status,
        reason: reason.into(),
        verdict,
        history: state.action_history,
        final_state,
    }
}
