//! Interface contracts for the external collaborators of a run.
//!
//! The engine never assumes anything about the implementations behind these
//! traits beyond the contracts below; the decision source in particular is
//! treated as untrusted and fallible.

use async_trait::async_trait;
use webpilot_core_types::{
    ActionRecord, ActionSpec, CoreError, Decision, PageState, ProgressSignal, Screenshot,
    StepPlan, TaskSpec,
};

/// One live browser session, exclusively owned by a single run.
#[async_trait]
pub trait BrowserDriver: Send {
    /// Load a URL and return the resulting state snapshot.
    async fn navigate(&mut self, url: &str) -> Result<PageState, CoreError>;

    /// Capture the current screenshot and state without acting.
    async fn observe(&mut self) -> Result<(Screenshot, PageState), CoreError>;

    /// Execute one primitive action. `Ok(false)` means the target could not
    /// be resolved (not found / occluded); the caller may retry with an
    /// alternate strategy. `Err` means the session itself failed.
    async fn act(&mut self, spec: &ActionSpec) -> Result<bool, CoreError>;

    /// Dismiss cookie banners, modals and similar transient obstructions.
    /// Returns whether anything was dismissed.
    async fn dismiss_transient_overlays(&mut self) -> Result<bool, CoreError>;

    /// Release the session. Called exactly once on every cooperative exit
    /// path; forced teardown relies on `Drop`.
    async fn close(&mut self) -> Result<(), CoreError>;
}

/// The vision-based action chooser.
#[async_trait]
pub trait DecisionSource: Send {
    /// Given the live screenshot, the goal and the recent history, return
    /// the next action or a terminal signal.
    async fn decide(
        &mut self,
        screenshot: &Screenshot,
        goal: &str,
        recent: &[ActionRecord],
    ) -> Result<Decision, CoreError>;

    /// The explicit "are we stuck or making progress?" escalation query.
    async fn check_progress(
        &mut self,
        goal: &str,
        recent: &[ActionRecord],
    ) -> Result<ProgressSignal, CoreError>;
}

/// The natural-language task planner, invoked once before the run starts.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, task: &TaskSpec) -> Result<StepPlan, CoreError>;
}
