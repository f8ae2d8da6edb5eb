use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Host configuration, read from YAML.
///
/// Every field has a default so partial files stay valid.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct HostConfig {
    /// Shell started for normal sessions
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default)]
    pub shell_args: Vec<String>,
    /// Shell started for failsafe sessions, without `shell_args`
    #[serde(default = "default_shell")]
    pub failsafe_shell: String,
    /// Remove sessions from the registry when their process exits.
    /// When false, finished sessions stay listed.
    #[serde(default = "default_true")]
    pub remove_finished_sessions: bool,
    /// Write registry and lifecycle events to `logs/events.jsonl`
    #[serde(default = "default_true")]
    pub event_log: bool,
}

fn default_shell() -> String {
    "/bin/sh".to_string()
}

fn default_true() -> bool {
    true
}

impl HostConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file as YAML: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise the bundled defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default_config())
        }
    }

    pub fn default_config() -> Self {
        const DEFAULT_HOST_YAML: &str = include_str!("../termhost.yaml");

        serde_yaml::from_str(DEFAULT_HOST_YAML)
            .expect("Failed to parse embedded termhost.yaml - this is a bug in the termhost.yaml file")
    }

    fn validate(&self) -> Result<()> {
        if self.shell.trim().is_empty() {
            anyhow::bail!("shell must not be empty");
        }
        if self.failsafe_shell.trim().is_empty() {
            anyhow::bail!("failsafe_shell must not be empty");
        }
        Ok(())
    }

    /// Program and arguments for a session.
    pub fn command_for(&self, failsafe: bool) -> (&str, &[String]) {
        if failsafe {
            (self.failsafe_shell.as_str(), &[][..])
        } else {
            (self.shell.as_str(), self.shell_args.as_slice())
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::default_config()
    }
}
