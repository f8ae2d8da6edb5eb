//! Home-based storage paths for termhost.
//!
//! Everything lives under `~/.termhost/` unless `TERMHOST_HOME` points
//! elsewhere:
//! - `config.yaml` - Host configuration
//! - `logs/debug.log` - tracing output
//! - `logs/events.jsonl` - Structured event log
//! - `saved-state.json` - Saved UI state between runs

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// The name of the termhost directory under the user's home.
const TERMHOST_DIR: &str = ".termhost";

/// Environment variable overriding the home directory.
pub const HOME_ENV: &str = "TERMHOST_HOME";

/// Returns the termhost home directory, creating it if needed.
///
/// # Errors
///
/// Returns an error if:
/// - Home directory cannot be determined
/// - Directory creation fails
pub fn termhost_home_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os(HOME_ENV) {
        Some(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => dirs::home_dir()
            .context("Could not determine home directory")?
            .join(TERMHOST_DIR),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create termhost directory: {}", dir.display()))?;
    Ok(dir)
}

/// Returns the default config path: `~/.termhost/config.yaml`
pub fn config_path() -> Result<PathBuf> {
    Ok(termhost_home_dir()?.join("config.yaml"))
}

/// Returns the logs directory: `~/.termhost/logs/`
///
/// Creates the directory if it doesn't exist.
pub fn logs_dir() -> Result<PathBuf> {
    let dir = termhost_home_dir()?.join("logs");
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;
    Ok(dir)
}

/// Returns the debug log path: `~/.termhost/logs/debug.log`
pub fn debug_log_path() -> Result<PathBuf> {
    Ok(logs_dir()?.join("debug.log"))
}

/// Returns the saved state path: `~/.termhost/saved-state.json`
pub fn saved_state_path() -> Result<PathBuf> {
    Ok(termhost_home_dir()?.join("saved-state.json"))
}
