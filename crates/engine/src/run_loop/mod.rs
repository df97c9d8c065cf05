//! The per-task execution state machine.
//!
//! A run walks the planned steps in order, delegating every Interact step's
//! concrete action to the decision source, then falls back to bounded
//! adaptive cycles when the plan is exhausted without a verified success.

pub mod config;
pub mod controller;
pub mod state;

pub use config::EngineConfig;
pub use controller::ExecutionEngine;
pub use state::{RunOutcome, RunStatus};
