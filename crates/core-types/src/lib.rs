use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Shared error type for the webpilot core crates.
#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("{message}")]
    Message { message: String },
}

impl CoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ActionId(pub String);

impl ActionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Submission payload for one natural-language task.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug)]
pub struct TaskSpec {
    pub id: TaskId,
    /// Natural-language description of what to accomplish.
    pub description: String,
    /// Entry point for the run, typically the application base URL.
    pub target_context: String,
}

impl TaskSpec {
    pub fn new(description: impl Into<String>, target_context: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            description: description.into(),
            target_context: target_context.into(),
        }
    }
}

/// Snapshot of observable page state returned by the browser driver.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default)]
pub struct PageState {
    pub url: String,
    /// Driver-computed hash of the rendered content.
    pub content_fingerprint: u64,
    pub title: Option<String>,
    /// Bounded excerpt of visible page text, used for generic pattern checks.
    pub text_sample: String,
}

impl PageState {
    pub fn new(url: impl Into<String>, content: &str) -> Self {
        let text_sample = truncate_sample(content, TEXT_SAMPLE_MAX_CHARS);
        Self {
            url: url.into(),
            content_fingerprint: content_fingerprint(content),
            title: None,
            text_sample,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

pub const TEXT_SAMPLE_MAX_CHARS: usize = 2000;

/// Stable hash over rendered content, insensitive to leading/trailing space.
pub fn content_fingerprint(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.trim().hash(&mut hasher);
    hasher.finish()
}

fn truncate_sample(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        content.chars().take(max_chars).collect()
    }
}

/// Opaque screenshot handle passed to the decision source.
#[derive(Clone, Debug, Default)]
pub struct Screenshot {
    pub data: Vec<u8>,
}

impl Screenshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Primitive action kinds the driver can execute.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ActionKind {
    Navigate,
    Click,
    TypeText,
    Select,
    Scroll,
    Wait,
}

impl ActionKind {
    /// Kinds that are expected to produce an observable page effect;
    /// an interactive action with no effect is recorded as not executed.
    pub fn is_interactive(self) -> bool {
        matches!(
            self,
            ActionKind::Click | ActionKind::TypeText | ActionKind::Select | ActionKind::Scroll
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Navigate => "navigate",
            ActionKind::Click => "click",
            ActionKind::TypeText => "type_text",
            ActionKind::Select => "select",
            ActionKind::Scroll => "scroll",
            ActionKind::Wait => "wait",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters attached to an action, populated per kind.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionParams {
    #[cfg_attr(feature = "serde-full", serde(skip_serializing_if = "Option::is_none"))]
    pub url: Option<String>,
    #[cfg_attr(feature = "serde-full", serde(skip_serializing_if = "Option::is_none"))]
    pub text: Option<String>,
    #[cfg_attr(feature = "serde-full", serde(skip_serializing_if = "Option::is_none"))]
    pub submit: Option<bool>,
    #[cfg_attr(feature = "serde-full", serde(skip_serializing_if = "Option::is_none"))]
    pub value: Option<String>,
    #[cfg_attr(feature = "serde-full", serde(skip_serializing_if = "Option::is_none"))]
    pub amount: Option<i32>,
    #[cfg_attr(feature = "serde-full", serde(skip_serializing_if = "Option::is_none"))]
    pub ms: Option<u64>,
}

/// A concrete action chosen by the decision source.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ActionSpec {
    pub kind: ActionKind,
    /// Human-readable label of the target element ("Save", "New item").
    pub target_label: Option<String>,
    /// Best-effort selector for the target, resolved by the driver.
    pub selector_hint: Option<String>,
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub params: ActionParams,
}

impl ActionSpec {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            target_label: None,
            selector_hint: None,
            params: ActionParams::default(),
        }
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        let mut spec = Self::new(ActionKind::Navigate);
        spec.params.url = Some(url.into());
        spec
    }

    pub fn click(label: impl Into<String>) -> Self {
        let mut spec = Self::new(ActionKind::Click);
        spec.target_label = Some(label.into());
        spec
    }

    pub fn type_text(label: impl Into<String>, text: impl Into<String>) -> Self {
        let mut spec = Self::new(ActionKind::TypeText);
        spec.target_label = Some(label.into());
        spec.params.text = Some(text.into());
        spec
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector_hint = Some(selector.into());
        self
    }

    pub fn label(&self) -> &str {
        self.target_label.as_deref().unwrap_or("")
    }
}

/// Terminal signals a decision source can return instead of an action.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TerminalSignal {
    /// The decision source believes the goal is reached.
    Done,
    /// The decision source wants to give up.
    Quit,
}

/// One answer from the decision source.
#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    Act(ActionSpec),
    Terminal(TerminalSignal),
}

/// Answer to the explicit "are we stuck or making progress?" query.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressSignal {
    Continue,
    Quit,
}

/// Closed set of planned step kinds.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StepKind {
    Navigate,
    Authenticate,
    Observe,
    Interact,
    Verify,
}

/// One entry of the plan produced before the run starts.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug)]
pub struct PlanStep {
    pub index: usize,
    pub kind: StepKind,
    /// Intent description; concrete targets for Interact steps are chosen
    /// dynamically from the live screenshot, never from the plan.
    pub description: String,
    /// Optional concrete target (URL for Navigate/Authenticate steps).
    pub target: Option<String>,
}

impl PlanStep {
    pub fn new(index: usize, kind: StepKind, description: impl Into<String>) -> Self {
        Self {
            index,
            kind,
            description: description.into(),
            target: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Ordered, read-only plan for one run.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default)]
pub struct StepPlan {
    pub steps: Vec<PlanStep>,
}

impl StepPlan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Record of one attempted action, appended exactly once per attempt.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug)]
pub struct ActionRecord {
    pub kind: ActionKind,
    pub target_label: String,
    pub selector_hint: Option<String>,
    pub url_before: String,
    pub url_after: String,
    pub state_hash_before: u64,
    pub state_hash_after: u64,
    pub page_changed: bool,
    pub executed: bool,
    pub timestamp: DateTime<Utc>,
}

impl ActionRecord {
    /// Build a record from the states captured around one attempt.
    ///
    /// `page_changed` is derived, never supplied: it holds iff the URL or the
    /// content hash differs across the attempt. An interactive action that
    /// produced no observable change is downgraded to `executed = false`
    /// even when the driver reported success.
    pub fn observed(
        spec: &ActionSpec,
        before: &PageState,
        after: &PageState,
        driver_ok: bool,
    ) -> Self {
        let page_changed = before.url != after.url
            || before.content_fingerprint != after.content_fingerprint;
        let executed = if spec.kind.is_interactive() && !page_changed {
            false
        } else {
            driver_ok
        };
        Self {
            kind: spec.kind,
            target_label: spec.label().to_string(),
            selector_hint: spec.selector_hint.clone(),
            url_before: before.url.clone(),
            url_after: after.url.clone(),
            state_hash_before: before.content_fingerprint,
            state_hash_after: after.content_fingerprint,
            page_changed,
            executed,
            timestamp: Utc::now(),
        }
    }

    /// Key used by repetition detection: same kind, same target, same origin.
    pub fn repeat_key(&self) -> (ActionKind, &str, &str) {
        (self.kind, self.target_label.as_str(), self.url_before.as_str())
    }
}

/// Verdict status of the completion verifier.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VerificationStatus {
    Success,
    Failure,
}

/// Per-group results of the three independent criteria checks.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SatisfiedCriteria {
    pub navigation: bool,
    pub action: bool,
    pub success_indicators: bool,
}

impl SatisfiedCriteria {
    pub fn all(&self) -> bool {
        self.navigation && self.action && self.success_indicators
    }
}

/// Structural evidence backing a verdict.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VerificationEvidence {
    pub urls_visited: Vec<String>,
    pub action_counts: BTreeMap<String, usize>,
    pub matched_patterns: Vec<String>,
}

/// Immutable outcome of one verification call.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub satisfied: SatisfiedCriteria,
    pub reasons: Vec<String>,
    pub evidence: VerificationEvidence,
}

impl VerificationResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status, VerificationStatus::Success)
    }
}

/// Progress notification delivered to subscribers while a run advances.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug)]
pub struct ProgressEvent {
    pub task_id: TaskId,
    pub step_index: Option<usize>,
    pub cycles_used: u32,
    pub last_action: Option<ActionKind>,
    pub at: DateTime<Utc>,
}
