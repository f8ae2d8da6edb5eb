//! Opaque key-value state handed to the host's save/restore mechanism.

use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const TOOLBAR_TEXT_INPUT: &str = "terminal_toolbar_text_input";
const RECREATED: &str = "activity_recreated";
const CURRENT_SESSION: &str = "current_session";

/// Saved UI state. The host persists it however it likes (JSON here).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SavedState {
    values: BTreeMap<String, String>,
}

impl SavedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn toolbar_text(&self) -> Option<&str> {
        self.get(TOOLBAR_TEXT_INPUT)
    }

    /// Stores the toolbar text unless it is empty.
    pub fn set_toolbar_text(&mut self, text: &str) {
        if !text.is_empty() {
            self.put(TOOLBAR_TEXT_INPUT, text);
        }
    }

    pub fn was_recreated(&self) -> bool {
        self.get(RECREATED) == Some("true")
    }

    pub fn mark_recreated(&mut self) {
        self.put(RECREATED, "true");
    }

    /// Stored current session. Unparseable values read as absent.
    pub fn current_session(&self) -> Option<SessionId> {
        self.get(CURRENT_SESSION).and_then(|v| v.parse().ok())
    }

    pub fn set_current_session(&mut self, id: SessionId) {
        self.put(CURRENT_SESSION, id.to_string());
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
