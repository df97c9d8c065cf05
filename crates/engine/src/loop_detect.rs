//! Repetition and oscillation detection over the recent action history.
//!
//! Detection is a pure function of the history tail; all escalation
//! bookkeeping stays in the run loop so there is a single source of truth
//! for run state.

use webpilot_core_types::ActionRecord;

/// Which rule fired, in priority order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoopRule {
    RepeatedIneffective,
    Oscillation,
    LowDiversity,
}

/// A detected non-progressing pattern.
#[derive(Clone, Debug)]
pub struct LoopSignal {
    pub rule: LoopRule,
    pub reason: String,
}

/// Inspects a bounded window of recent actions for stuck patterns.
#[derive(Clone, Debug)]
pub struct LoopDetector {
    window: usize,
}

/// Detection starts once the history holds this many entries.
pub const MIN_HISTORY: usize = 4;

impl LoopDetector {
    /// Window size is clamped to the supported 4-6 band.
    pub fn new(window: usize) -> Self {
        Self {
            window: window.clamp(4, 6),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Cadence gate: checks run every `interval` actions starting once the
    /// history reaches [`MIN_HISTORY`] entries.
    pub fn check_due(&self, history_len: usize, interval: usize) -> bool {
        history_len >= MIN_HISTORY && (history_len - MIN_HISTORY) % interval.max(1) == 0
    }

    /// Evaluate the detection rules in priority order over the window tail.
    pub fn detect(&self, history: &[ActionRecord]) -> Option<LoopSignal> {
        if history.len() < 2 {
            return None;
        }
        let start = history.len().saturating_sub(self.window);
        let tail = &history[start..];

        self.repeated_ineffective(tail)
            .or_else(|| self.oscillation(tail))
            .or_else(|| self.low_diversity(tail))
    }

    /// Rule 1: the same (kind, target, origin URL) attempted back to back
    /// with no observable effect either time.
    fn repeated_ineffective(&self, tail: &[ActionRecord]) -> Option<LoopSignal> {
        let mut streak = 1usize;
        let mut best = 1usize;
        let mut best_label = "";
        for pair in tail.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            if prev.repeat_key() == cur.repeat_key() && !prev.page_changed && !cur.page_changed {
                streak += 1;
                if streak > best {
                    best = streak;
                    best_label = cur.target_label.as_str();
                }
            } else {
                streak = 1;
            }
        }
        if best >= 2 {
            Some(LoopSignal {
                rule: LoopRule::RepeatedIneffective,
                reason: format!("same element '{best_label}', no effect, {best} times"),
            })
        } else {
            None
        }
    }

    /// Rule 2: an A-B-A-B alternation across the window.
    fn oscillation(&self, tail: &[ActionRecord]) -> Option<LoopSignal> {
        if tail.len() < 4 {
            return None;
        }
        let keys: Vec<_> = tail.iter().map(|record| record.repeat_key()).collect();
        if keys[0] == keys[1] {
            return None;
        }
        let alternating = keys.windows(3).all(|w| w[0] == w[2] && w[0] != w[1]);
        if alternating {
            Some(LoopSignal {
                rule: LoopRule::Oscillation,
                reason: format!(
                    "oscillating between '{}' and '{}' across {} actions",
                    tail[0].target_label,
                    tail[1].target_label,
                    tail.len()
                ),
            })
        } else {
            None
        }
    }

    /// Rule 3: fewer than two distinct actions across a full window.
    fn low_diversity(&self, tail: &[ActionRecord]) -> Option<LoopSignal> {
        if tail.len() < self.window {
            return None;
        }
        let mut distinct: Vec<_> = Vec::new();
        for record in tail {
            let key = record.repeat_key();
            if !distinct.contains(&key) {
                distinct.push(key);
            }
        }
        if distinct.len() < 2 {
            Some(LoopSignal {
                rule: LoopRule::LowDiversity,
                reason: format!(
                    "only {} distinct action across the last {} actions",
                    distinct.len(),
                    tail.len()
                ),
            })
        } else {
            None
        }
    }
}

impl Default for LoopDetector {
    fn default() -> Self {
        Self::new(5)
    }
}
