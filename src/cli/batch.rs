use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use webpilot_core_types::{TaskId, TaskSpec};
use webpilot_scheduler::{
    SchedulerError, SchedulerService, TaskEventKind, TaskScheduler, TaskStatus,
};

use crate::config::AppConfig;
use crate::sim::SimBackend;

#[derive(Args)]
pub struct BatchArgs {
    /// File with one task description per line; blank lines and lines
    /// starting with '#' are skipped
    #[arg(long)]
    pub tasks_file: PathBuf,

    /// Entry URL of the target application
    #[arg(long, default_value = "https://demo.app/items")]
    pub entry_url: String,

    /// Override the configured worker-pool size
    #[arg(long)]
    pub workers: Option<usize>,
}

pub async fn execute(args: BatchArgs, config: AppConfig) -> Result<()> {
    let content = std::fs::read_to_string(&args.tasks_file)
        .with_context(|| format!("failed to read {}", args.tasks_file.display()))?;
    let descriptions: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();
    if descriptions.is_empty() {
        anyhow::bail!("no tasks in {}", args.tasks_file.display());
    }

    let mut scheduler_config = config.scheduler_config();
    if let Some(workers) = args.workers {
        scheduler_config.workers = workers.max(1);
    }

    let backend = Arc::new(SimBackend::new());
    let scheduler = SchedulerService::new(scheduler_config, config.engine_config(), backend);
    scheduler.start().await;

    let mut events = scheduler.subscribe();
    let mut submitted: Vec<(TaskId, String)> = Vec::new();
    for description in descriptions {
        let spec = TaskSpec::new(description, args.entry_url.clone());
        match scheduler.submit(spec).await {
            Ok(id) => submitted.push((id, description.to_string())),
            Err(err @ SchedulerError::QueueFull { .. }) => {
                warn!(task = description, error = %err, "submission rejected");
            }
            Err(err) => return Err(err.into()),
        }
    }
    info!(count = submitted.len(), "batch submitted");

    loop {
        if let Ok(Ok(event)) =
            tokio::time::timeout(Duration::from_millis(200), events.recv()).await
        {
            if let TaskEventKind::Status { status } = event.kind {
                info!(task = %event.task_id, ?status, "status");
            }
        }
        let all_terminal = submitted.iter().all(|(id, _)| {
            scheduler
                .status(id)
                .map(TaskStatus::is_terminal)
                .unwrap_or(true)
        });
        if all_terminal {
            break;
        }
    }

    let mut failures = 0usize;
    for (id, description) in &submitted {
        let Some(task) = scheduler.task(id) else {
            continue;
        };
        let reason = task.reason.unwrap_or_default();
        println!("{:<10} {:<40} {}", format!("{:?}", task.status), description, reason);
        if task.status != TaskStatus::Succeeded {
            failures += 1;
        }
    }
    if failures > 0 {
        warn!(failures, "batch finished with failures");
    }
    Ok(())
}
