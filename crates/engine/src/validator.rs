//! Effect validation around every primitive action.
//!
//! State is captured immediately before and after the driver call; the
//! resulting [`ActionRecord`] is the only place an action's effect is
//! judged. A click that "succeeded" without changing the page is recorded
//! as not executed, which is the signal the loop detector consumes.

use tracing::debug;

use webpilot_core_types::{ActionRecord, ActionSpec, PageState};

use crate::errors::EngineError;
use crate::ports::BrowserDriver;

/// Result of one validated action attempt.
#[derive(Debug)]
pub struct ValidatedAction {
    pub record: ActionRecord,
    /// State captured immediately after the final attempt.
    pub after: PageState,
}

/// Execute `spec` with before/after capture and the alternate-strategy
/// retry ladder. Target-resolution misses are retried up to `attempts`
/// (including the first try); session failures propagate.
pub async fn run_validated(
    driver: &mut dyn BrowserDriver,
    spec: &ActionSpec,
    attempts: u8,
) -> Result<ValidatedAction, EngineError> {
    let (_, before) = driver.observe().await.map_err(EngineError::driver)?;

    let mut resolved = false;
    for attempt in 0..attempts.max(1) {
        let attempt_spec = strategy_for(spec, attempt);
        match driver.act(&attempt_spec).await {
            Ok(true) => {
                resolved = true;
                break;
            }
            Ok(false) => {
                debug!(
                    kind = %spec.kind,
                    target = spec.label(),
                    attempt = attempt + 1,
                    "target not resolved; dismissing overlays and retrying"
                );
                let _ = driver
                    .dismiss_transient_overlays()
                    .await
                    .map_err(EngineError::driver)?;
            }
            Err(err) => return Err(EngineError::driver(err)),
        }
    }

    let (_, after) = driver.observe().await.map_err(EngineError::driver)?;
    let record = ActionRecord::observed(spec, &before, &after, resolved);
    Ok(ValidatedAction { record, after })
}

/// Alternate target-matching ladder: the original spec first, then the
/// label-only form so the driver falls back to text matching.
fn strategy_for(spec: &ActionSpec, attempt: u8) -> ActionSpec {
    if attempt == 0 || spec.selector_hint.is_none() {
        spec.clone()
    } else {
        let mut fallback = spec.clone();
        fallback.selector_hint = None;
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use webpilot_core_types::{ActionKind, CoreError, Screenshot};

    /// Driver double that resolves the target only once the selector hint
    /// is dropped, and mutates its page on success.
    struct FlakyDriver {
        url: String,
        content: String,
        acts: Vec<ActionSpec>,
        overlay_dismissals: usize,
        resolve_on_fallback_only: bool,
        effect: bool,
    }

    impl FlakyDriver {
        fn new(effect: bool, resolve_on_fallback_only: bool) -> Self {
            Self {
                url: "https://app/form".to_string(),
                content: "form".to_string(),
                acts: Vec::new(),
                overlay_dismissals: 0,
                resolve_on_fallback_only,
                effect,
            }
        }

        fn state(&self) -> PageState {
            PageState::new(self.url.clone(), &self.content)
        }
    }

    #[async_trait]
    impl BrowserDriver for FlakyDriver {
        async fn navigate(&mut self, url: &str) -> Result<PageState, CoreError> {
            self.url = url.to_string();
            Ok(self.state())
        }

        async fn observe(&mut self) -> Result<(Screenshot, PageState), CoreError> {
            Ok((Screenshot::empty(), self.state()))
        }

        async fn act(&mut self, spec: &ActionSpec) -> Result<bool, CoreError> {
            self.acts.push(spec.clone());
            if self.resolve_on_fallback_only && spec.selector_hint.is_some() {
                return Ok(false);
            }
            if self.effect {
                self.content.push_str(" changed");
            }
            Ok(true)
        }

        async fn dismiss_transient_overlays(&mut self) -> Result<bool, CoreError> {
            self.overlay_dismissals += 1;
            Ok(false)
        }

        async fn close(&mut self) -> Result<(), CoreError> {
            Ok(())
        }
    }

    fn click_with_hint() -> ActionSpec {
        ActionSpec::click("Save").with_selector("#save")
    }

    #[tokio::test]
    async fn effective_action_is_recorded_executed() {
        let mut driver = FlakyDriver::new(true, false);
        let validated = run_validated(&mut driver, &click_with_hint(), 3)
            .await
            .unwrap();
        assert!(validated.record.executed);
        assert!(validated.record.page_changed);
        assert_eq!(driver.acts.len(), 1);
    }

    #[tokio::test]
    async fn falls_back_to_label_matching_after_miss() {
        let mut driver = FlakyDriver::new(true, true);
        let validated = run_validated(&mut driver, &click_with_hint(), 3)
            .await
            .unwrap();
        assert!(validated.record.executed);
        assert_eq!(driver.acts.len(), 2);
        assert!(driver.acts[0].selector_hint.is_some());
        assert!(driver.acts[1].selector_hint.is_none());
        assert_eq!(driver.overlay_dismissals, 1);
        // The audit record keeps the original selector hint.
        assert_eq!(validated.record.selector_hint.as_deref(), Some("#save"));
    }

    #[tokio::test]
    async fn dead_interaction_is_downgraded() {
        let mut driver = FlakyDriver::new(false, false);
        let validated = run_validated(&mut driver, &click_with_hint(), 3)
            .await
            .unwrap();
        assert!(!validated.record.page_changed);
        assert!(!validated.record.executed, "no observable effect");
    }

    #[tokio::test]
    async fn exhausted_attempts_record_unexecuted() {
        struct NeverResolves(FlakyDriver);

        #[async_trait]
        impl BrowserDriver for NeverResolves {
            async fn navigate(&mut self, url: &str) -> Result<PageState, CoreError> {
                self.0.navigate(url).await
            }
            async fn observe(&mut self) -> Result<(Screenshot, PageState), CoreError> {
                self.0.observe().await
            }
            async fn act(&mut self, spec: &ActionSpec) -> Result<bool, CoreError> {
                self.0.acts.push(spec.clone());
                Ok(false)
            }
            async fn dismiss_transient_overlays(&mut self) -> Result<bool, CoreError> {
                self.0.dismiss_transient_overlays().await
            }
            async fn close(&mut self) -> Result<(), CoreError> {
                Ok(())
            }
        }

        let mut driver = NeverResolves(FlakyDriver::new(true, true));
        let validated = run_validated(&mut driver, &click_with_hint(), 3)
            .await
            .unwrap();
        assert!(!validated.record.executed);
        assert_eq!(validated.record.kind, ActionKind::Click);
        assert_eq!(driver.0.acts.len(), 3);
    }
}
