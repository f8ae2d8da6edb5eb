//! Structured JSONL event log for lifecycle reconstruction.
//!
//! Each line carries:
//! - a monotonic sequence number for ordering
//! - an ISO 8601 timestamp with microsecond precision
//! - the host instance id, for correlating runs that share a log file
//! - the emitting component and a JSON event payload

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::foreground::Visibility;
use crate::registry::RegistryEvent;

/// Structured JSONL logger.
pub struct StructuredLogger {
    host_id: String,
    seq: AtomicU64,
    log_file: Mutex<File>,
    log_path: PathBuf,
}

/// A single log entry in JSONL format.
#[derive(Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonic sequence number (unique within one logger)
    pub seq: u64,
    /// ISO 8601 timestamp with microseconds
    pub ts: String,
    /// Host instance id
    pub host_id: String,
    /// Component that emitted the log
    pub component: String,
    /// Structured event data
    pub event: Value,
}

impl StructuredLogger {
    /// Creates a logger appending to `<logs_dir>/events.jsonl`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The logs directory cannot be created
    /// - The log file cannot be opened
    pub fn new(host_id: &str, logs_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(logs_dir)?;
        let log_path = logs_dir.join("events.jsonl");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            host_id: host_id.to_string(),
            seq: AtomicU64::new(0),
            log_file: Mutex::new(file),
            log_path,
        })
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Logs a structured event as a single line. Thread-safe; write errors
    /// are ignored.
    pub fn log(&self, component: &str, event: impl Serialize) {
        let entry = LogEntry {
            seq: self.next_seq(),
            ts: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            host_id: self.host_id.clone(),
            component: component.to_string(),
            event: serde_json::to_value(event).unwrap_or(Value::Null),
        };

        if let Ok(mut file) = self.log_file.lock() {
            if let Ok(line) = serde_json::to_string(&entry) {
                let _ = writeln!(file, "{}", line);
                let _ = file.flush();
            }
        }
    }

    pub fn log_registry_event(&self, event: &RegistryEvent) {
        let payload = match event {
            RegistryEvent::Added(id) => serde_json::json!({ "type": "Added", "session": id }),
            RegistryEvent::Removed(id) => serde_json::json!({ "type": "Removed", "session": id }),
            RegistryEvent::Updated(id) => serde_json::json!({ "type": "Updated", "session": id }),
            RegistryEvent::CurrentChanged { previous, current } => serde_json::json!({
                "type": "CurrentChanged",
                "previous": previous,
                "current": current
            }),
        };
        self.log("Registry", payload);
    }

    pub fn log_lifecycle(&self, edge: &str) {
        self.log(
            "Lifecycle",
            serde_json::json!({
                "type": "Edge",
                "edge": edge
            }),
        );
    }

    pub fn log_visibility(&self, visibility: Visibility) {
        self.log(
            "Foreground",
            serde_json::json!({
                "type": "Visibility",
                "visibility": visibility
            }),
        );
    }

    /// Logs a deferred callback that arrived after its owner was torn down.
    pub fn log_discarded_callbacks(&self, count: usize) {
        self.log(
            "Callbacks",
            serde_json::json!({
                "type": "Discarded",
                "count": count
            }),
        );
    }

    pub fn log_launch_failure(&self, session: Option<crate::session::SessionId>, message: &str) {
        self.log(
            "Callbacks",
            serde_json::json!({
                "type": "LaunchFailed",
                "session": session,
                "message": message
            }),
        );
    }

    pub fn path(&self) -> &PathBuf {
        &self.log_path
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }
}

#[cfg(test)]
#[path = "tests/structured_logger_tests.rs"]
mod tests;
