//! Browser driver over the simulated web application.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{sleep, Duration};

use webpilot_core_types::{ActionKind, ActionSpec, CoreError, PageState, Screenshot};
use webpilot_engine::BrowserDriver;

use super::webapp::SimWebApp;

/// One simulated browser session. The screenshot handle carries the
/// rendered page text, standing in for pixels.
pub struct SimDriver {
    app: SimWebApp,
    closed: bool,
    releases: Option<Arc<AtomicUsize>>,
}

impl SimDriver {
    pub fn new() -> Self {
        Self {
            app: SimWebApp::new(),
            closed: false,
            releases: None,
        }
    }

    /// Count session releases (close or drop) into `counter`, for tests and
    /// teardown accounting.
    pub fn with_release_counter(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.releases = Some(counter);
        self
    }

    fn state(&self) -> PageState {
        PageState::new(self.app.url(), &self.app.body()).with_title(self.app.title())
    }

    fn record_release(&mut self) {
        if let Some(counter) = &self.releases {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Default for SimDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserDriver for SimDriver {
    async fn navigate(&mut self, url: &str) -> Result<PageState, CoreError> {
        self.app.open(url);
        Ok(self.state())
    }

    async fn observe(&mut self) -> Result<(Screenshot, PageState), CoreError> {
        let screenshot = Screenshot {
            data: self.app.body().into_bytes(),
        };
        Ok((screenshot, self.state()))
    }

    async fn act(&mut self, spec: &ActionSpec) -> Result<bool, CoreError> {
        match spec.kind {
            ActionKind::Navigate => match &spec.params.url {
                Some(url) => {
                    self.app.open(url);
                    Ok(true)
                }
                None => Ok(false),
            },
            ActionKind::Click => Ok(self.app.click(spec.label())),
            ActionKind::TypeText => {
                let text = spec.params.text.clone().unwrap_or_default();
                Ok(self.app.type_text(spec.label(), &text))
            }
            // The demo site has no dropdowns or scrollable regions.
            ActionKind::Select | ActionKind::Scroll => Ok(false),
            ActionKind::Wait => {
                sleep(Duration::from_millis(spec.params.ms.unwrap_or(10).min(1000))).await;
                Ok(true)
            }
        }
    }

    async fn dismiss_transient_overlays(&mut self) -> Result<bool, CoreError> {
        Ok(self.app.dismiss_banner())
    }

    async fn close(&mut self) -> Result<(), CoreError> {
        if !self.closed {
            self.closed = true;
            self.record_release();
        }
        Ok(())
    }
}

impl Drop for SimDriver {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            self.record_release();
        }
    }
}
