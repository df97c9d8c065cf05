//! Application configuration.
//!
//! Values come from a YAML file (`./config/webpilot.yaml`, falling back to
//! the user config directory), every field has a default, and CLI flags win
//! over file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use webpilot_engine::EngineConfig;
use webpilot_scheduler::SchedulerConfig;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerSettings,
    pub engine: EngineSettings,
    pub logging: LoggingSettings,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub workers: usize,
    pub queue_capacity: usize,
    pub task_timeout_secs: u64,
    pub cancel_grace_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            workers: 5,
            queue_capacity: 64,
            task_timeout_secs: 300,
            cancel_grace_secs: 5,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub max_adaptive_cycles: u32,
    pub loop_window: usize,
    pub loop_check_interval: usize,
    pub max_loop_escalations: u32,
    pub action_attempts: u8,
    pub settle_delay_ms: u64,
    pub history_tail: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let defaults = EngineConfig::default();
        Self {
            max_adaptive_cycles: defaults.max_adaptive_cycles,
            loop_window: defaults.loop_window,
            loop_check_interval: defaults.loop_check_interval,
            max_loop_escalations: defaults.max_loop_escalations,
            action_attempts: defaults.action_attempts,
            settle_delay_ms: defaults.settle_delay_ms,
            history_tail: defaults.history_tail,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load from the explicit path, or the first existing default location.
    /// A missing default file yields the built-in defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved = match path {
            Some(explicit) => Some(explicit.to_path_buf()),
            None => default_config_path(),
        };
        match resolved {
            Some(file) if file.exists() => {
                let content = std::fs::read_to_string(&file)
                    .with_context(|| format!("failed to read config {}", file.display()))?;
                let config: AppConfig = serde_yaml::from_str(&content)
                    .with_context(|| format!("invalid config {}", file.display()))?;
                info!(path = %file.display(), "Loaded configuration");
                Ok(config)
            }
            Some(file) if path.is_some() => {
                anyhow::bail!("config file {} does not exist", file.display())
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            workers: self.scheduler.workers.max(1),
            queue_capacity: self.scheduler.queue_capacity.max(1),
            task_timeout: Duration::from_secs(self.scheduler.task_timeout_secs.max(1)),
            cancel_grace: Duration::from_secs(self.scheduler.cancel_grace_secs.max(1)),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_adaptive_cycles: self.engine.max_adaptive_cycles,
            loop_window: self.engine.loop_window.clamp(4, 6),
            loop_check_interval: self.engine.loop_check_interval.max(1),
            max_loop_escalations: self.engine.max_loop_escalations,
            action_attempts: self.engine.action_attempts.max(1),
            settle_delay_ms: self.engine.settle_delay_ms,
            history_tail: self.engine.history_tail.max(1),
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from("config/webpilot.yaml");
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir().map(|mut dir| {
        dir.push("webpilot");
        dir.push("config.yaml");
        dir
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.scheduler.workers, 5);
        assert_eq!(config.engine.max_adaptive_cycles, 12);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config: AppConfig = serde_yaml::from_str("scheduler:\n  workers: 2\n").unwrap();
        assert_eq!(config.scheduler.workers, 2);
        assert_eq!(config.scheduler.queue_capacity, 64);
        assert_eq!(config.engine.loop_window, 5);
    }

    #[test]
    fn engine_config_clamps_window() {
        let mut config = AppConfig::default();
        config.engine.loop_window = 12;
        assert_eq!(config.engine_config().loop_window, 6);
    }
}
