use thiserror::Error;

/// Errors emitted by the engine crate.
///
/// Cancellation and negative verdicts are not errors; they surface as
/// `RunOutcome` statuses. These variants cover infrastructure failures of
/// the external collaborators.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The browser driver failed outright (session dead, protocol error).
    #[error("browser driver failure: {0}")]
    Driver(String),

    /// The decision source failed to produce an answer.
    #[error("decision source failure: {0}")]
    Decision(String),

    /// The planner could not produce a plan for the task.
    #[error("planner failure: {0}")]
    Planner(String),
}

impl EngineError {
    pub fn driver(err: impl std::fmt::Display) -> Self {
        Self::Driver(err.to_string())
    }

    pub fn decision(err: impl std::fmt::Display) -> Self {
        Self::Decision(err.to_string())
    }

    pub fn planner(err: impl std::fmt::Display) -> Self {
        Self::Planner(err.to_string())
    }
}
