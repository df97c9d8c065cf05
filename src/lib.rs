//! webpilot CLI library.
//!
//! Exposes the configuration, telemetry, CLI and simulated-backend modules
//! for integration testing.

pub mod cli;
pub mod config;
pub mod sim;
pub mod telemetry;

pub use config::AppConfig;
