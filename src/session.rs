//! Session identity and lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Opaque session identifier. Allocated monotonically by the registry and
/// never reused within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(SessionId)
    }
}

/// Process state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SessionState {
    /// Added to the registry, process not reported yet
    #[default]
    Starting,
    /// Underlying process is alive
    Running { pid: u32 },
    /// Process exited (or never started)
    Finished { exit_status: i32 },
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Starting => write!(f, "starting"),
            SessionState::Running { pid } => write!(f, "running (pid {})", pid),
            SessionState::Finished { exit_status } => write!(f, "finished ({})", exit_status),
        }
    }
}

/// One logical terminal/process instance tracked by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Display title; `None` until the user or the process names it
    pub title: Option<String>,
    /// Failsafe sessions run the fallback shell without user startup files
    pub failsafe: bool,
    pub state: SessionState,
}

impl Session {
    pub fn new(id: SessionId, failsafe: bool, title: Option<String>) -> Self {
        Self {
            id,
            title: title.filter(|t| !t.trim().is_empty()),
            failsafe,
            state: SessionState::Starting,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Running { .. })
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, SessionState::Finished { .. })
    }

    pub fn pid(&self) -> Option<u32> {
        match self.state {
            SessionState::Running { pid } => Some(pid),
            _ => None,
        }
    }

    /// Title for list display. Falls back to `[<id>]` like an unnamed tab.
    pub fn display_title(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None if self.failsafe => format!("[{}] failsafe", self.id),
            None => format!("[{}]", self.id),
        }
    }
}
