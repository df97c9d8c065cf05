use anyhow::Result;
use clap::Parser;

use webpilot_cli::cli::{Cli, Command};
use webpilot_cli::config::AppConfig;
use webpilot_cli::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let json = cli.log_json || config.logging.json;
    let _guard = telemetry::init_logging(&level, json, cli.log_dir.as_deref())?;

    match cli.command {
        Command::Run(args) => webpilot_cli::cli::run::execute(args, config).await,
        Command::Batch(args) => webpilot_cli::cli::batch::execute(args, config).await,
    }
}
