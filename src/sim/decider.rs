//! Decision sources for the simulated backend.
//!
//! `SimDecider` is a small deterministic heuristic standing in for the
//! vision model: it reads the page text out of the screenshot handle and
//! picks the obvious next move for the demo site. `ScriptedDecider` replays
//! a fixed decision sequence and is used by tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::time::{sleep, Duration};

use webpilot_core_types::{
    ActionRecord, ActionSpec, CoreError, Decision, ProgressSignal, Screenshot, TerminalSignal,
};
use webpilot_engine::DecisionSource;

pub struct SimDecider;

impl SimDecider {
    pub fn new() -> Self {
        Self
    }

    fn quoted_name(goal: &str) -> Option<String> {
        let start = goal.find('\'')?;
        let rest = &goal[start + 1..];
        let end = rest.find('\'')?;
        Some(rest[..end].to_string())
    }

    /// Name to enter into a creation form: the quoted term if present,
    /// otherwise the goal's last word.
    fn entry_name(goal: &str) -> String {
        Self::quoted_name(goal)
            .or_else(|| goal.split_whitespace().last().map(str::to_string))
            .unwrap_or_else(|| "untitled".to_string())
    }

    fn wants_deletion(goal: &str) -> bool {
        let lower = goal.to_lowercase();
        lower.contains("delete") || lower.contains("remove")
    }

    fn wants_creation(goal: &str) -> bool {
        let lower = goal.to_lowercase();
        lower.contains("create") || lower.contains("add") || lower.contains("new")
    }
}

impl Default for SimDecider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionSource for SimDecider {
    async fn decide(
        &mut self,
        screenshot: &Screenshot,
        goal: &str,
        _recent: &[ActionRecord],
    ) -> Result<Decision, CoreError> {
        let view = String::from_utf8_lossy(&screenshot.data);

        if view.contains("created successfully") || view.contains("removed successfully") {
            return Ok(Decision::Terminal(TerminalSignal::Done));
        }

        if Self::wants_creation(goal) {
            if view.contains("New item form") {
                let name = Self::entry_name(goal);
                if view.contains(&format!("Name: {name}")) {
                    return Ok(Decision::Act(ActionSpec::click("Save")));
                }
                return Ok(Decision::Act(ActionSpec::type_text("Name", name)));
            }
            return Ok(Decision::Act(ActionSpec::click("New item")));
        }

        if Self::wants_deletion(goal) {
            if view.contains("[Delete]") {
                return Ok(Decision::Act(ActionSpec::click("Delete")));
            }
            let target = Self::entry_name(goal);
            return Ok(Decision::Act(ActionSpec::click(target)));
        }

        // Read-style goals: the listing itself is the answer.
        Ok(Decision::Terminal(TerminalSignal::Done))
    }

    async fn check_progress(
        &mut self,
        _goal: &str,
        _recent: &[ActionRecord],
    ) -> Result<ProgressSignal, CoreError> {
        // The heuristic has no alternative strategies; a stuck query means
        // it is genuinely stuck.
        Ok(ProgressSignal::Quit)
    }
}

/// Replays a fixed script; runs dry into Quit.
pub struct ScriptedDecider {
    decisions: VecDeque<Decision>,
    progress: VecDeque<ProgressSignal>,
    delay: Duration,
}

impl ScriptedDecider {
    pub fn new(decisions: Vec<Decision>, progress: Vec<ProgressSignal>) -> Self {
        Self {
            decisions: decisions.into(),
            progress: progress.into(),
            delay: Duration::ZERO,
        }
    }

    /// Pause before every decision, to simulate a slow decision source.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl DecisionSource for ScriptedDecider {
    async fn decide(
        &mut self,
        _screenshot: &Screenshot,
        _goal: &str,
        _recent: &[ActionRecord],
    ) -> Result<Decision, CoreError> {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        Ok(self
            .decisions
            .pop_front()
            .unwrap_or(Decision::Terminal(TerminalSignal::Quit)))
    }

    async fn check_progress(
        &mut self,
        _goal: &str,
        _recent: &[ActionRecord],
    ) -> Result<ProgressSignal, CoreError> {
        Ok(self.progress.pop_front().unwrap_or(ProgressSignal::Quit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shot(text: &str) -> Screenshot {
        Screenshot {
            data: text.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn creation_heuristic_walks_the_form() {
        let mut decider = SimDecider::new();
        let goal = "create an item named 'gamma'";

        let open = decider.decide(&shot("Items\n[New item]"), goal, &[]).await.unwrap();
        assert_eq!(open, Decision::Act(ActionSpec::click("New item")));

        let enter = decider
            .decide(&shot("New item form\nName: \n[Save]"), goal, &[])
            .await
            .unwrap();
        assert_eq!(enter, Decision::Act(ActionSpec::type_text("Name", "gamma")));

        let save = decider
            .decide(&shot("New item form\nName: gamma\n[Save]"), goal, &[])
            .await
            .unwrap();
        assert_eq!(save, Decision::Act(ActionSpec::click("Save")));

        let done = decider
            .decide(&shot("Item 'gamma' created successfully"), goal, &[])
            .await
            .unwrap();
        assert_eq!(done, Decision::Terminal(TerminalSignal::Done));
    }

    #[tokio::test]
    async fn scripted_decider_runs_dry_into_quit() {
        let mut decider = ScriptedDecider::new(vec![Decision::Act(ActionSpec::click("A"))], vec![]);
        let first = decider.decide(&shot(""), "goal", &[]).await.unwrap();
        assert_eq!(first, Decision::Act(ActionSpec::click("A")));
        let second = decider.decide(&shot(""), "goal", &[]).await.unwrap();
        assert_eq!(second, Decision::Terminal(TerminalSignal::Quit));
    }
}
