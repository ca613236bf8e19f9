// ABOUTME: Configuration structures and environment variable parsing for logging
// ABOUTME: Log levels, output targets and the rolling log file location

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::Level;

/// `tracing::Level` with a lowercase string representation in config files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLevel(pub Level);

impl Serialize for LogLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(level_name(self.0))
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<LogLevel, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_log_level(&s)
            .map(LogLevel)
            .map_err(serde::de::Error::custom)
    }
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        LogLevel(level)
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel(Level::INFO)
    }
}

/// Logging configuration for hosts embedding the completion engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global log level
    pub level: LogLevel,

    /// Per-target overrides, e.g. `quill_completion = "trace"`
    pub module_levels: BTreeMap<String, LogLevel>,

    pub output: OutputConfig,

    pub file: FileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub console: bool,
    pub file: bool,
    /// Emit the file output as JSON lines
    pub json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            console: false,
            file: true,
            json: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    #[default]
    Daily,
    Hourly,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Defaults to `<cache dir>/quill/quill.log`
    pub path: PathBuf,
    pub rotation: Rotation,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: default_log_file_path(),
            rotation: Rotation::default(),
        }
    }
}

impl LoggingConfig {
    /// Default configuration with environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read logging config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse logging config: {}", path.display()))
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    /// `QUILL_LOG` wins over `RUST_LOG`; the flag variables only need to be present.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(level) = lookup("QUILL_LOG") {
            self.level = LogLevel(parse_log_level(&level).context("Invalid QUILL_LOG level")?);
        } else if let Some(directives) = lookup("RUST_LOG") {
            self.parse_rust_log(&directives)?;
        }

        if lookup("QUILL_LOG_JSON").is_some() {
            self.output.json = true;
        }
        if lookup("QUILL_LOG_NO_CONSOLE").is_some() {
            self.output.console = false;
        }
        if lookup("QUILL_LOG_NO_FILE").is_some() {
            self.output.file = false;
        }

        Ok(())
    }

    /// Parse `RUST_LOG` style directives such as `info,quill_completion=trace`
    fn parse_rust_log(&mut self, rust_log: &str) -> Result<()> {
        for directive in rust_log.split(',').map(str::trim) {
            if directive.is_empty() {
                continue;
            }

            match directive.split_once('=') {
                Some((module, level)) => {
                    let level = parse_log_level(level).with_context(|| {
                        format!("Invalid log level '{level}' for module '{module}'")
                    })?;
                    self.module_levels
                        .insert(module.to_string(), LogLevel(level));
                }
                None => {
                    self.level = LogLevel(
                        parse_log_level(directive)
                            .with_context(|| format!("Invalid global log level '{directive}'"))?,
                    );
                }
            }
        }
        Ok(())
    }

    /// Filter directives in `EnvFilter` syntax
    pub fn directives(&self) -> String {
        let mut directives = vec![level_name(self.level.0).to_string()];
        directives.extend(
            self.module_levels
                .iter()
                .map(|(module, level)| format!("{module}={}", level_name(level.0))),
        );
        directives.join(",")
    }
}

fn default_log_file_path() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("quill"))
        .unwrap_or_default()
        .join("quill.log")
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Parse a log level string (case-insensitive)
pub fn parse_log_level(level_str: &str) -> Result<Level> {
    match level_str.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "Invalid log level: {level_str}. Must be one of: trace, debug, info, warn, error"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level.0, Level::INFO);
        assert!(!config.output.console);
        assert!(config.output.file);
        assert!(!config.output.json);
        assert!(config.file.path.ends_with("quill.log"));
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("trace").unwrap(), Level::TRACE);
        assert_eq!(parse_log_level("Warning").unwrap(), Level::WARN);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_quill_log_wins_over_rust_log() {
        let mut config = LoggingConfig::default();
        config
            .apply_overrides(lookup(&[("QUILL_LOG", "debug"), ("RUST_LOG", "error")]))
            .unwrap();
        assert_eq!(config.level.0, Level::DEBUG);
    }

    #[test]
    fn test_rust_log_module_directives() {
        let mut config = LoggingConfig::default();
        config
            .apply_overrides(lookup(&[("RUST_LOG", "warn, quill_completion=trace")]))
            .unwrap();
        assert_eq!(config.level.0, Level::WARN);
        assert_eq!(
            config.module_levels.get("quill_completion"),
            Some(&LogLevel(Level::TRACE))
        );
        assert_eq!(config.directives(), "warn,quill_completion=trace");
    }

    #[test]
    fn test_output_flags() {
        let mut config = LoggingConfig::default();
        config
            .apply_overrides(lookup(&[("QUILL_LOG_JSON", "1"), ("QUILL_LOG_NO_FILE", "")]))
            .unwrap();
        assert!(config.output.json);
        assert!(!config.output.file);
    }

    #[test]
    fn test_invalid_level_is_an_error() {
        let mut config = LoggingConfig::default();
        let err = config
            .apply_overrides(lookup(&[("QUILL_LOG", "verbose")]))
            .unwrap_err();
        assert!(err.to_string().contains("QUILL_LOG"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logging.toml");
        std::fs::write(
            &path,
            r#"
            level = "debug"

            [module_levels]
            quill_completion = "trace"

            [output]
            console = true
            "#,
        )
        .unwrap();

        let config = LoggingConfig::load_from_file(&path).unwrap();
        assert_eq!(config.level.0, Level::DEBUG);
        assert!(config.output.console);
        assert!(config.output.file);
        assert_eq!(config.file.rotation, Rotation::Daily);
    }
}
