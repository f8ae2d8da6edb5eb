use crate::session::{Session, SessionId, SessionState};
use tokio::sync::mpsc;

/// Largest id accepted from an execution context. Larger ids would leave the
/// allocator no room for new sessions.
pub const MAX_ADOPTED_ID: u64 = u64::MAX / 2;

/// Change notification emitted on every registry mutation.
///
/// Consumed by the session list adapter to stay in sync; the registry itself
/// never touches a rendering surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Added(SessionId),
    Removed(SessionId),
    /// A session's state or title changed
    Updated(SessionId),
    CurrentChanged {
        previous: Option<SessionId>,
        current: Option<SessionId>,
    },
}

/// Owns the ordered collection of sessions and the current selection.
///
/// Insertion order is display order. Not designed for concurrent mutation;
/// all calls are expected from the owner thread.
pub struct SessionRegistry {
    sessions: Vec<Session>,
    current: Option<SessionId>,
    /// Selection history, most recent last. Only holds live ids.
    history: Vec<SessionId>,
    next_id: u64,
    subscribers: Vec<mpsc::UnboundedSender<RegistryEvent>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Vec::new(),
            current: None,
            history: Vec::new(),
            next_id: 1,
            subscribers: Vec::new(),
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<RegistryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Create a session, append it and make it current.
    pub fn add_session(&mut self, failsafe: bool, name: Option<String>) -> Session {
        let id = SessionId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);

        let session = Session::new(id, failsafe, name);
        self.sessions.push(session.clone());
        tracing::debug!("Added session {} ({} total)", id, self.sessions.len());
        self.emit(RegistryEvent::Added(id));
        self.select(id);
        session
    }

    /// Import sessions owned by an already running execution context.
    ///
    /// Ids are kept as-is; sessions already present or with an id above
    /// [`MAX_ADOPTED_ID`] are skipped. Does not change the current selection.
    pub fn adopt(&mut self, sessions: Vec<Session>) -> usize {
        let mut adopted = 0;
        for session in sessions {
            if self.get(session.id).is_some() {
                continue;
            }
            if session.id.0 > MAX_ADOPTED_ID {
                tracing::warn!("Not adopting session {}: id out of range", session.id);
                continue;
            }
            self.next_id = self.next_id.max(session.id.0.saturating_add(1));
            let id = session.id;
            self.sessions.push(session);
            self.emit(RegistryEvent::Added(id));
            adopted += 1;
        }
        adopted
    }

    /// Remove a session. Returns false if the id is unknown.
    ///
    /// If the removed session was current, the most recently current survivor
    /// becomes current, falling back to the last session, or none.
    pub fn remove_session(&mut self, id: SessionId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };

        self.sessions.remove(index);
        self.history.retain(|h| *h != id);
        tracing::debug!("Removed session {} ({} left)", id, self.sessions.len());
        self.emit(RegistryEvent::Removed(id));

        if self.current == Some(id) {
            let next = self
                .history
                .last()
                .copied()
                .or_else(|| self.sessions.last().map(|s| s.id));
            match next {
                Some(next) => self.select(next),
                None => {
                    self.current = None;
                    self.emit(RegistryEvent::CurrentChanged {
                        previous: Some(id),
                        current: None,
                    });
                }
            }
        }
        true
    }

    /// Make `id` current. Returns false without mutating if unknown.
    pub fn set_current(&mut self, id: SessionId) -> bool {
        if self.index_of(id).is_none() {
            return false;
        }
        self.select(id);
        true
    }

    fn select(&mut self, id: SessionId) {
        let previous = self.current;
        self.current = Some(id);
        self.history.retain(|h| *h != id);
        self.history.push(id);
        self.emit(RegistryEvent::CurrentChanged {
            previous,
            current: Some(id),
        });
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.and_then(|id| self.get(id))
    }

    pub fn current_id(&self) -> Option<SessionId> {
        self.current
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn index_of(&self, id: SessionId) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == id)
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn last(&self) -> Option<&Session> {
        self.sessions.last()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Record that the session's process started.
    pub fn mark_running(&mut self, id: SessionId, pid: u32) -> bool {
        self.update(id, |s| s.state = SessionState::Running { pid })
    }

    /// Record that the session's process exited.
    pub fn mark_finished(&mut self, id: SessionId, exit_status: i32) -> bool {
        self.update(id, |s| s.state = SessionState::Finished { exit_status })
    }

    pub fn set_title(&mut self, id: SessionId, title: Option<String>) -> bool {
        let title = title.filter(|t| !t.trim().is_empty());
        self.update(id, |s| s.title = title)
    }

    fn update(&mut self, id: SessionId, f: impl FnOnce(&mut Session)) -> bool {
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == id) else {
            return false;
        };
        f(session);
        self.emit(RegistryEvent::Updated(id));
        true
    }

    fn emit(&mut self, event: RegistryEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
