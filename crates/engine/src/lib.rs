//! webpilot execution engine.
//!
//! Composes the browser driver, decision source, action validator, loop
//! detector and completion verifier into one cancellable run per task.

pub mod errors;
pub mod loop_detect;
pub mod ports;
pub mod run_loop;
pub mod validator;
pub mod verdict;

pub use errors::EngineError;
pub use loop_detect::{LoopDetector, LoopRule, LoopSignal};
pub use ports::{BrowserDriver, DecisionSource, Planner};
pub use run_loop::controller::REASON_CANCELLED;
pub use run_loop::{EngineConfig, ExecutionEngine, RunOutcome, RunStatus};
