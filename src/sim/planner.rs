//! Plan generation for the simulated backend.

use async_trait::async_trait;

use webpilot_core_types::{CoreError, PlanStep, StepKind, StepPlan, TaskSpec};
use webpilot_engine::Planner;

/// Produces the generic entry plan: open the target, let the decision
/// source work the page, verify. Interact steps carry intent only; the
/// concrete actions are chosen live.
pub struct SimPlanner {
    interact_steps: usize,
}

impl SimPlanner {
    pub fn new() -> Self {
        Self { interact_steps: 3 }
    }

    pub fn with_interact_steps(mut self, steps: usize) -> Self {
        self.interact_steps = steps;
        self
    }
}

impl Default for SimPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Planner for SimPlanner {
    async fn plan(&self, task: &TaskSpec) -> Result<StepPlan, CoreError> {
        let mut steps = vec![
            PlanStep::new(0, StepKind::Navigate, "open the target application")
                .with_target(task.target_context.clone()),
            PlanStep::new(1, StepKind::Observe, "survey the landing page"),
        ];
        for offset in 0..self.interact_steps {
            steps.push(PlanStep::new(
                2 + offset,
                StepKind::Interact,
                "advance towards the goal",
            ));
        }
        steps.push(PlanStep::new(
            2 + self.interact_steps,
            StepKind::Verify,
            "check whether the goal is met",
        ));
        Ok(StepPlan::new(steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plan_opens_target_and_ends_with_verify() {
        let planner = SimPlanner::new();
        let task = TaskSpec::new("create an item", "https://demo.app/items");
        let plan = planner.plan(&task).await.unwrap();
        assert_eq!(plan.steps.first().unwrap().kind, StepKind::Navigate);
        assert_eq!(
            plan.steps.first().unwrap().target.as_deref(),
            Some("https://demo.app/items")
        );
        assert_eq!(plan.steps.last().unwrap().kind, StepKind::Verify);
        assert_eq!(plan.len(), 6);
    }
}
