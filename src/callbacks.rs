//! Single-consumer callback queue between background work and the owner.
//!
//! Execution contexts report results through a [`SessionClientHandle`]. The
//! handle never blocks and never touches the registry; messages are drained
//! on the owner thread by [`CallbackQueue::drain`], which drops anything sent
//! by a torn-down owner.

use crate::errors::SessionError;
use crate::lifetime::OwnerToken;
use crate::session::SessionId;
use tokio::sync::mpsc;

/// Result of background work, applied on the owner thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    SessionStarted { id: SessionId, pid: u32 },
    SessionFinished { id: SessionId, exit_status: i32 },
    TitleChanged { id: SessionId, title: Option<String> },
    LaunchFailed { id: SessionId, message: String },
    /// Environment preparation (first-run setup) finished
    EnvironmentReady,
    EnvironmentFailed { message: String },
}

/// A message tagged with the liveness token of the owner it targets.
#[derive(Debug)]
pub struct Deferred {
    token: OwnerToken,
    message: ClientMessage,
}

impl Deferred {
    /// Unwrap the message if its owner is still live.
    pub fn open(self) -> Result<ClientMessage, SessionError> {
        if self.token.is_live() {
            Ok(self.message)
        } else {
            Err(SessionError::OwnerTornDown)
        }
    }
}

/// Session client given to the execution context.
///
/// Cheap to clone and `Send`, so it can move into spawned tasks.
#[derive(Debug, Clone)]
pub struct SessionClientHandle {
    token: OwnerToken,
    tx: mpsc::UnboundedSender<Deferred>,
}

impl SessionClientHandle {
    fn send(&self, message: ClientMessage) {
        let deferred = Deferred {
            token: self.token.clone(),
            message,
        };
        if self.tx.send(deferred).is_err() {
            tracing::debug!("Callback queue closed, dropping message");
        }
    }

    pub fn session_started(&self, id: SessionId, pid: u32) {
        self.send(ClientMessage::SessionStarted { id, pid });
    }

    pub fn session_finished(&self, id: SessionId, exit_status: i32) {
        self.send(ClientMessage::SessionFinished { id, exit_status });
    }

    pub fn title_changed(&self, id: SessionId, title: Option<String>) {
        self.send(ClientMessage::TitleChanged { id, title });
    }

    pub fn launch_failed(&self, id: SessionId, message: impl Into<String>) {
        self.send(ClientMessage::LaunchFailed {
            id,
            message: message.into(),
        });
    }

    pub fn environment_ready(&self) {
        self.send(ClientMessage::EnvironmentReady);
    }

    pub fn environment_failed(&self, message: impl Into<String>) {
        self.send(ClientMessage::EnvironmentFailed {
            message: message.into(),
        });
    }

    /// Whether the owner this handle reports to is still live.
    pub fn is_live(&self) -> bool {
        self.token.is_live()
    }
}

/// Receiving end, owned by the host.
pub struct CallbackQueue {
    tx: mpsc::UnboundedSender<Deferred>,
    rx: mpsc::UnboundedReceiver<Deferred>,
}

impl CallbackQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Create a client handle bound to `token`.
    pub fn handle(&self, token: OwnerToken) -> SessionClientHandle {
        SessionClientHandle {
            token,
            tx: self.tx.clone(),
        }
    }

    /// Take every pending message whose owner is still live. Stale messages
    /// are discarded and counted in the second element.
    pub fn drain(&mut self) -> (Vec<ClientMessage>, usize) {
        let mut messages = Vec::new();
        let mut discarded = 0;
        while let Ok(deferred) = self.rx.try_recv() {
            match deferred.open() {
                Ok(message) => messages.push(message),
                Err(e) => {
                    tracing::debug!("Discarding deferred callback: {}", e);
                    discarded += 1;
                }
            }
        }
        (messages, discarded)
    }

    /// Wait for the next message, live or not. Used by async drivers to
    /// wake up; the message is returned unopened.
    pub async fn recv(&mut self) -> Option<Deferred> {
        self.rx.recv().await
    }
}

impl Default for CallbackQueue {
    fn default() -> Self {
        Self::new()
    }
}
