// ABOUTME: Completion engine configuration types
// ABOUTME: Debounce windows, fuzzy opt-in and re-trigger settings loaded from TOML

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Upper bound accepted for any debounce window
pub const MAX_DEBOUNCE_MS: u64 = 2000;

/// Engine-wide completion configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Wait before the first request of a cycle is sent
    #[serde(default = "default_leading_debounce_ms")]
    pub leading_debounce_ms: u64,
    /// Fixed window between requests while the popup is open.
    /// Falls back to the observed latency when unset.
    pub subsequent_debounce_ms: Option<u64>,
    /// Ask for a fresh result on every keystroke and filter client side
    pub server_side_fuzzy_completion: bool,
    /// Re-trigger completion after deleting text
    pub trigger_on_delete: bool,
    #[serde(default = "default_delete_retrigger_ms")]
    pub delete_retrigger_ms: u64,
    /// Enable the signature help cycle
    #[serde(default = "default_signature_help")]
    pub signature_help: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            leading_debounce_ms: default_leading_debounce_ms(),
            subsequent_debounce_ms: None,
            server_side_fuzzy_completion: false,
            trigger_on_delete: false,
            delete_retrigger_ms: default_delete_retrigger_ms(),
            signature_help: default_signature_help(),
        }
    }
}

fn default_leading_debounce_ms() -> u64 {
    25
}

fn default_delete_retrigger_ms() -> u64 {
    50
}

fn default_signature_help() -> bool {
    true
}

impl CompletionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read completion config: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid completion config: {}", path.display()))
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).context("Failed to parse completion config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let windows = [
            ("leading_debounce_ms", Some(self.leading_debounce_ms)),
            ("subsequent_debounce_ms", self.subsequent_debounce_ms),
            ("delete_retrigger_ms", Some(self.delete_retrigger_ms)),
        ];
        for (name, value) in windows {
            if let Some(ms) = value
                && ms > MAX_DEBOUNCE_MS
            {
                bail!("{name} = {ms} exceeds the maximum of {MAX_DEBOUNCE_MS} ms");
            }
        }
        Ok(())
    }

    pub fn leading_debounce(&self) -> Duration {
        Duration::from_millis(self.leading_debounce_ms)
    }

    pub fn delete_retrigger(&self) -> Duration {
        Duration::from_millis(self.delete_retrigger_ms)
    }
}

/// Per-server overrides supplied when a server is attached to a buffer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachOptions {
    pub leading_debounce_ms: Option<u64>,
    pub subsequent_debounce_ms: Option<u64>,
    pub server_side_fuzzy_completion: Option<bool>,
}

impl AttachOptions {
    /// Leading debounce for this server, falling back to the engine default
    pub fn leading_debounce(&self, config: &CompletionConfig) -> Duration {
        Duration::from_millis(
            self.leading_debounce_ms
                .unwrap_or(config.leading_debounce_ms),
        )
    }

    pub fn subsequent_debounce(&self, config: &CompletionConfig) -> Option<Duration> {
        self.subsequent_debounce_ms
            .or(config.subsequent_debounce_ms)
            .map(Duration::from_millis)
    }

    pub fn fuzzy(&self, config: &CompletionConfig) -> bool {
        self.server_side_fuzzy_completion
            .unwrap_or(config.server_side_fuzzy_completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CompletionConfig::default();
        assert_eq!(config.leading_debounce_ms, 25);
        assert_eq!(config.subsequent_debounce_ms, None);
        assert!(!config.server_side_fuzzy_completion);
        assert!(!config.trigger_on_delete);
        assert_eq!(config.delete_retrigger_ms, 50);
        assert!(config.signature_help);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CompletionConfig::from_toml_str(
            r#"
            subsequent_debounce_ms = 80
            trigger_on_delete = true
            "#,
        )
        .unwrap();
        assert_eq!(config.leading_debounce_ms, 25);
        assert_eq!(config.subsequent_debounce_ms, Some(80));
        assert!(config.trigger_on_delete);
    }

    #[test]
    fn test_rejects_oversized_window() {
        let err = CompletionConfig::from_toml_str("leading_debounce_ms = 5000").unwrap_err();
        assert!(format!("{err:#}").contains("leading_debounce_ms"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server_side_fuzzy_completion = true").unwrap();

        let config = CompletionConfig::load_from_file(file.path()).unwrap();
        assert!(config.server_side_fuzzy_completion);
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = CompletionConfig::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));
    }

    #[test]
    fn test_attach_options_override() {
        let config = CompletionConfig::default();
        let options = AttachOptions {
            leading_debounce_ms: Some(100),
            server_side_fuzzy_completion: Some(true),
            ..Default::default()
        };
        assert_eq!(options.leading_debounce(&config), Duration::from_millis(100));
        assert!(options.fuzzy(&config));
        assert_eq!(options.subsequent_debounce(&config), None);

        let defaults = AttachOptions::default();
        assert_eq!(defaults.leading_debounce(&config), Duration::from_millis(25));
    }
}
