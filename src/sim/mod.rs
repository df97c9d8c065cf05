//! Simulated backend: a deterministic web application, driver, decision
//! source and planner, used by the demo CLI and the integration tests in
//! place of a real browser and vision model.

pub mod decider;
pub mod driver;
pub mod planner;
pub mod webapp;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use async_trait::async_trait;

use webpilot_core_types::{CoreError, StepPlan, TaskSpec};
use webpilot_engine::{BrowserDriver, DecisionSource, Planner};
use webpilot_scheduler::RunnerBackend;

pub use decider::{ScriptedDecider, SimDecider};
pub use driver::SimDriver;
pub use planner::SimPlanner;
pub use webapp::SimWebApp;

/// Backend wiring the simulated collaborators into the scheduler. Each run
/// gets a fresh application instance and session.
pub struct SimBackend {
    planner: SimPlanner,
    releases: Arc<AtomicUsize>,
}

impl SimBackend {
    pub fn new() -> Self {
        Self {
            planner: SimPlanner::new(),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Session-release counter shared by all drivers this backend creates.
    pub fn release_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.releases)
    }
}

impl Default for SimBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunnerBackend for SimBackend {
    async fn create_driver(&self) -> Result<Box<dyn BrowserDriver>, CoreError> {
        Ok(Box::new(
            SimDriver::new().with_release_counter(Arc::clone(&self.releases)),
        ))
    }

    async fn create_decider(&self) -> Result<Box<dyn DecisionSource>, CoreError> {
        Ok(Box::new(SimDecider::new()))
    }

    async fn plan(&self, task: &TaskSpec) -> Result<StepPlan, CoreError> {
        self.planner.plan(task).await
    }
}
