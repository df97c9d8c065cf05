//! webpilot task scheduler.
//!
//! Admits task submissions through a bounded FIFO gate, runs up to N
//! execution engines concurrently, tracks task lifecycle, and notifies
//! subscribers of status and progress.

pub mod api;
pub mod error;
pub mod events;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod runtime;

pub use api::{RunnerBackend, SchedulerService, TaskScheduler};
pub use error::SchedulerError;
pub use events::{TaskEvent, TaskEventKind};
pub use model::{SchedulerConfig, Task, TaskStatus};
