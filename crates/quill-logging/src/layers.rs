// ABOUTME: Layer constructors for the console, file and JSON outputs
// ABOUTME: Each output is a boxed layer so the subscriber can compose any subset

use std::fs;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, fmt::format::FmtSpan};

use crate::config::{FileConfig, LoggingConfig, OutputConfig, Rotation};

pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Compact console output on stderr
pub fn create_console_layer(config: &OutputConfig) -> Option<BoxedLayer> {
    if !config.console {
        return None;
    }

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .boxed();

    Some(layer)
}

/// Rolling file output. The guard flushes the background writer when dropped.
pub fn create_file_layer(
    file: &FileConfig,
    output: &OutputConfig,
) -> Result<Option<(BoxedLayer, WorkerGuard)>> {
    if !output.file {
        return Ok(None);
    }

    let directory = file
        .path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(|parent| parent.to_path_buf())
        .unwrap_or_else(|| ".".into());
    fs::create_dir_all(&directory)
        .with_context(|| format!("Failed to create log directory: {}", directory.display()))?;

    let file_name = file
        .path
        .file_name()
        .and_then(|name| name.to_str())
        .context("Invalid log file path")?;

    let appender: RollingFileAppender = match file.rotation {
        Rotation::Daily => rolling::daily(&directory, file_name),
        Rotation::Hourly => rolling::hourly(&directory, file_name),
        Rotation::Never => rolling::never(&directory, file_name),
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = if output.json {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed()
    };

    Ok(Some((layer, guard)))
}

/// JSON lines on stdout, used when no file output is configured
pub fn create_json_layer(config: &OutputConfig) -> Option<BoxedLayer> {
    if !config.json || config.file {
        return None;
    }

    let layer = fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(true)
        .with_span_events(FmtSpan::CLOSE)
        .boxed();

    Some(layer)
}

pub fn create_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_new(config.directives()).context("Invalid log filter directives")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use tempfile::tempdir;
    use tracing::Level;

    #[test]
    fn test_console_layer_follows_flag() {
        let enabled = OutputConfig {
            console: true,
            ..Default::default()
        };
        assert!(create_console_layer(&enabled).is_some());
        assert!(create_console_layer(&OutputConfig::default()).is_none());
    }

    #[test]
    fn test_json_layer_only_without_file_output() {
        let stdout_json = OutputConfig {
            json: true,
            file: false,
            ..Default::default()
        };
        assert!(create_json_layer(&stdout_json).is_some());

        let file_json = OutputConfig {
            json: true,
            file: true,
            ..Default::default()
        };
        assert!(create_json_layer(&file_json).is_none());
    }

    #[test]
    fn test_file_layer_creates_directory() {
        let temp_dir = tempdir().unwrap();
        let file = FileConfig {
            path: temp_dir.path().join("nested").join("quill.log"),
            rotation: Rotation::Never,
        };

        let layer = create_file_layer(&file, &OutputConfig::default()).unwrap();
        assert!(layer.is_some());
        assert!(temp_dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_file_layer_disabled() {
        let output = OutputConfig {
            file: false,
            ..Default::default()
        };
        let layer = create_file_layer(&FileConfig::default(), &output).unwrap();
        assert!(layer.is_none());
    }

    #[test]
    fn test_env_filter_from_module_levels() {
        let mut config = LoggingConfig {
            level: LogLevel(Level::DEBUG),
            ..Default::default()
        };
        config
            .module_levels
            .insert("quill_completion".to_string(), LogLevel(Level::TRACE));

        assert!(create_env_filter(&config).is_ok());
    }
}
