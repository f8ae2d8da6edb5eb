//! Interface to the detached background execution context.
//!
//! The context owns process spawning; the core only asks it to launch or
//! finish sessions and receives results through a [`SessionClientHandle`].

use crate::callbacks::SessionClientHandle;
use crate::session::{Session, SessionId};
use std::sync::{Arc, Mutex};

/// What to start for a newly added session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub id: SessionId,
    pub failsafe: bool,
    pub name: Option<String>,
}

impl From<&Session> for LaunchRequest {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            failsafe: session.failsafe,
            name: session.title.clone(),
        }
    }
}

/// Execution context as seen through a lock.
pub type DynContext = dyn ExecutionContext + Send;

/// Handle to a context shared between hosts. The context outlives any one
/// host: a torn-down host detaches, and a new one attaches to the same
/// context and adopts its sessions.
pub type SharedContext = Arc<Mutex<DynContext>>;

/// Background execution context (the long-lived service side).
///
/// Implementations must not block: `launch` and `prepare_environment` start
/// work and return, reporting outcomes through the handle.
pub trait ExecutionContext {
    fn is_sessions_empty(&self) -> bool;

    /// Sessions the context is already running, in display order.
    fn sessions(&self) -> Vec<Session>;

    fn set_session_client(&mut self, client: SessionClientHandle);

    /// Drop the client so the context keeps no path back to a dead owner.
    fn unset_session_client(&mut self);

    /// Start the process for a session already added to the registry.
    fn launch(&mut self, request: LaunchRequest, client: SessionClientHandle);

    /// Ask a running session's process to finish. Returns false if the
    /// session is unknown to the context or not running.
    fn finish_if_running(&mut self, id: SessionId) -> bool;

    /// First-run setup before the first session can start. Reports
    /// `environment_ready` or `environment_failed` when done.
    fn prepare_environment(&mut self, client: SessionClientHandle) {
        client.environment_ready();
    }

    /// The UI became visible or hidden. Contexts use this to toggle
    /// notification and keep-alive behavior.
    fn set_ui_visible(&mut self, _visible: bool) {}
}
