// ABOUTME: Tracing subscriber initialization and layer composition
// ABOUTME: Installs the configured outputs behind a single environment filter

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

use crate::config::LoggingConfig;
use crate::layers::{
    BoxedLayer, create_console_layer, create_env_filter, create_file_layer, create_json_layer,
};

/// Keeps background log writers alive. Dropping it flushes pending file output.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Build every enabled output layer for `config`
pub fn build_layers(config: &LoggingConfig) -> Result<(Vec<BoxedLayer>, Option<WorkerGuard>)> {
    let mut layers = Vec::new();
    let mut guard = None;

    if let Some(layer) = create_console_layer(&config.output) {
        layers.push(layer);
    }
    if let Some((layer, file_guard)) = create_file_layer(&config.file, &config.output)? {
        layers.push(layer);
        guard = Some(file_guard);
    }
    if let Some(layer) = create_json_layer(&config.output) {
        layers.push(layer);
    }

    Ok((layers, guard))
}

/// Install the global tracing subscriber described by `config`
pub fn init_subscriber(config: LoggingConfig) -> Result<LoggingGuard> {
    let filter = create_env_filter(&config)?;
    let (layers, guard) = build_layers(&config)?;

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    tracing::info!(
        log_level = %config.level.0,
        console_output = config.output.console,
        file_output = config.output.file,
        json_output = config.output.json,
        file_path = %config.file.path.display(),
        "Quill logging initialized"
    );

    Ok(LoggingGuard { _file: guard })
}
