//! Configuration for the execution run loop.

use serde::{Deserialize, Serialize};

/// Tuning knobs for one execution engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum adaptive observe-decide-act-validate cycles after the plan is
    /// exhausted without a verified success.
    /// Default: 12
    pub max_adaptive_cycles: u32,

    /// Sliding window of recent actions inspected by the loop detector.
    /// Valid range 4-6.
    /// Default: 5
    pub loop_window: usize,

    /// Loop detection cadence: evaluated every this many actions once the
    /// history holds at least four entries.
    /// Default: 2
    pub loop_check_interval: usize,

    /// Stuck-or-progress escalations allowed per run before aborting.
    /// Default: 2
    pub max_loop_escalations: u32,

    /// Attempts per action (including the first try) across alternate
    /// target-matching strategies.
    /// Default: 3
    pub action_attempts: u8,

    /// Pause after each executed action, letting the page settle before the
    /// next observation.
    /// Default: 100
    pub settle_delay_ms: u64,

    /// How many trailing history records the decision source sees.
    /// Default: 8
    pub history_tail: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_adaptive_cycles: 12,
            loop_window: 5,
            loop_check_interval: 2,
            max_loop_escalations: 2,
            action_attempts: 3,
            settle_delay_ms: 100,
            history_tail: 8,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tight limits for unit tests.
    pub fn minimal() -> Self {
        Self {
            max_adaptive_cycles: 4,
            loop_window: 4,
            loop_check_interval: 2,
            max_loop_escalations: 2,
            action_attempts: 2,
            settle_delay_ms: 0,
            history_tail: 6,
        }
    }

    /// Builder: set the adaptive cycle budget.
    pub fn adaptive_cycles(mut self, cycles: u32) -> Self {
        self.max_adaptive_cycles = cycles;
        self
    }

    /// Builder: set the loop-detection window (clamped to 4-6).
    pub fn window(mut self, window: usize) -> Self {
        self.loop_window = window.clamp(4, 6);
        self
    }

    /// Builder: set the escalation budget.
    pub fn escalations(mut self, max: u32) -> Self {
        self.max_loop_escalations = max;
        self
    }

    /// Builder: set attempts per action.
    pub fn attempts(mut self, attempts: u8) -> Self {
        self.action_attempts = attempts;
        self
    }
}
