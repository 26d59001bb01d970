use std::sync::Arc;

use anyhow::Context;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    fmt, fmt::writer::BoxMakeWriter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::config::LoggingConfig;

/// Initialize structured logging based on configuration
///
/// Logs go to stderr (or the configured file) so that command output on
/// stdout stays machine readable. `RUST_LOG` directives take precedence
/// over the configured level.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = env_filter(&config.level)?;

    let writer = match &config.file_path {
        Some(file_path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)
                .with_context(|| format!("Failed to open log file {file_path}"))?;
            BoxMakeWriter::new(Arc::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_line_number(true);
    let registry = tracing_subscriber::registry().with(env_filter);

    if config.format == "json" {
        registry
            .with(layer.json().with_current_span(true).with_file(true))
            .try_init()?;
    } else {
        registry.with(layer.pretty().with_file(false)).try_init()?;
    }
    Ok(())
}

fn env_filter(level: &str) -> anyhow::Result<EnvFilter> {
    let level: LevelFilter = level
        .parse()
        .with_context(|| format!("Invalid log level: {level}"))?;
    Ok(EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy())
}
