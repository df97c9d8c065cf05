use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use webpilot_core_types::TaskSpec;
use webpilot_scheduler::{SchedulerService, TaskEventKind, TaskScheduler, TaskStatus};

use crate::config::AppConfig;
use crate::sim::SimBackend;

#[derive(Args)]
pub struct RunArgs {
    /// Natural-language description of the task
    #[arg(long)]
    pub task: String,

    /// Entry URL of the target application
    #[arg(long, default_value = "https://demo.app/items")]
    pub entry_url: String,

    /// Hard per-task timeout (e.g. "90s", "5m")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,
}

pub async fn execute(args: RunArgs, config: AppConfig) -> Result<()> {
    let mut scheduler_config = config.scheduler_config();
    if let Some(timeout) = args.timeout {
        scheduler_config.task_timeout = timeout;
    }

    let backend = Arc::new(SimBackend::new());
    let scheduler = SchedulerService::new(scheduler_config, config.engine_config(), backend);
    scheduler.start().await;

    let mut events = scheduler.subscribe();
    let spec = TaskSpec::new(args.task, args.entry_url);
    let id = scheduler.submit(spec).await?;
    info!(task = %id, "task submitted");

    loop {
        if let Ok(Ok(event)) =
            tokio::time::timeout(Duration::from_millis(200), events.recv()).await
        {
            if event.task_id == id {
                match event.kind {
                    TaskEventKind::Status { status } => info!(task = %id, ?status, "status"),
                    TaskEventKind::Progress {
                        step_index,
                        cycles_used,
                        last_action,
                    } => info!(task = %id, ?step_index, cycles_used, ?last_action, "progress"),
                }
            }
        }
        if scheduler
            .status(&id)
            .map(TaskStatus::is_terminal)
            .unwrap_or(false)
        {
            break;
        }
    }

    let task = scheduler.task(&id).context("task record missing")?;
    println!("{}", serde_json::to_string_pretty(&task.evidence_document())?);
    if task.status != TaskStatus::Succeeded {
        anyhow::bail!(
            "task {}: {}",
            id,
            task.reason.unwrap_or_else(|| "did not succeed".to_string())
        );
    }
    Ok(())
}
