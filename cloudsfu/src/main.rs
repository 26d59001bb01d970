mod cli;
mod config;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use cloudsfu_controller::ControllerClient;
use tracing::debug;

use crate::cli::{Cli, Output};
use crate::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(url) = cli.controller_url {
        settings.controller.base_url = url;
    }
    if cli.debug_requests {
        settings.controller.enable_debug_logs = true;
        settings.logging.level = "debug".to_string();
    }
    if let Some(level) = cli.log_level {
        settings.logging.level = level;
    }

    logging::init_logging(&settings.logging)?;
    debug!(controller = %settings.controller.base_url, "Configuration loaded");

    let client = ControllerClient::new(&settings.controller)
        .context("Invalid controller configuration")?;

    match cli::run(&client, cli.command).await? {
        Output::Json(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Output::Text(text) => print!("{text}"),
    }
    Ok(())
}
