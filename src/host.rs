//! Terminal host: the UI-free owner that ties the pieces together.
//!
//! A front end drives the host through lifecycle edges (`on_create`,
//! `attach`, `on_start`, `on_stop`, `on_destroy`) and user actions
//! (`add_new_session`, `select_session`, `kill_session`). Results of
//! background work come back through the callback queue and are applied by
//! `process_callbacks` on the owner thread.

use crate::callbacks::{CallbackQueue, ClientMessage, Deferred, SessionClientHandle};
use crate::config::HostConfig;
use crate::context::{DynContext, LaunchRequest, SharedContext};
use crate::errors::SessionError;
use crate::foreground::{ForegroundCoordinator, StyleReloadTarget, Visibility};
use crate::lifetime::OwnerLifetime;
use crate::registry::{RegistryEvent, SessionRegistry};
use crate::saved_state::SavedState;
use crate::session::{Session, SessionId, SessionState};
use crate::structured_logger::StructuredLogger;
use crate::style_reload::StyleReloadChannel;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// How the front end was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchAction {
    #[default]
    Main,
    /// Explicit "new session" shortcut: always add a session
    Run,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LaunchIntent {
    pub action: LaunchAction,
    pub failsafe: bool,
}

/// User-visible message for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    LaunchFailed {
        session: Option<SessionId>,
        error: SessionError,
    },
    /// Only raised while the UI is visible
    SessionFinished { id: SessionId, exit_status: i32 },
}

pub struct TerminalHost {
    config: HostConfig,
    registry: SessionRegistry,
    foreground: ForegroundCoordinator,
    lifetime: OwnerLifetime,
    callbacks: CallbackQueue,
    context: Option<SharedContext>,
    logger: Option<Arc<StructuredLogger>>,
    log_feed: Option<mpsc::UnboundedReceiver<RegistryEvent>>,
    /// Failsafe flag of the first session, waiting for environment setup
    pending_initial: Option<bool>,
    /// Sessions added while no context was attached
    unlaunched: Vec<SessionId>,
    stored_current: Option<SessionId>,
    toolbar_text: String,
    recreated: bool,
    finishing: bool,
    destroyed: bool,
    notices: Vec<Notice>,
}

impl TerminalHost {
    pub fn new(
        config: HostConfig,
        channel: StyleReloadChannel,
        target: Weak<dyn StyleReloadTarget>,
    ) -> Self {
        Self {
            config,
            registry: SessionRegistry::new(),
            foreground: ForegroundCoordinator::new(channel, target),
            lifetime: OwnerLifetime::new(),
            callbacks: CallbackQueue::new(),
            context: None,
            logger: None,
            log_feed: None,
            pending_initial: None,
            unlaunched: Vec::new(),
            stored_current: None,
            toolbar_text: String::new(),
            recreated: false,
            finishing: false,
            destroyed: false,
            notices: Vec::new(),
        }
    }

    /// Mirror registry and lifecycle events into a structured log.
    pub fn with_logger(mut self, logger: Arc<StructuredLogger>) -> Self {
        self.log_feed = Some(self.registry.subscribe());
        self.logger = Some(logger);
        self
    }

    /// Restore what the previous instance saved.
    pub fn on_create(&mut self, saved: Option<&SavedState>) {
        if let Some(saved) = saved {
            self.recreated = saved.was_recreated();
            self.stored_current = saved.current_session();
            if let Some(text) = saved.toolbar_text() {
                self.toolbar_text = text.to_string();
            }
        }
        self.log_edge("on_create");
    }

    /// Bind to the execution context.
    ///
    /// Sessions the context already runs are adopted, and sessions added
    /// before attaching are launched. With nothing to show, the context
    /// prepares its environment and one session is added once it is ready.
    /// Otherwise a `Run` intent adds a session, and any other intent
    /// reselects the stored session or the last one.
    pub fn attach(&mut self, context: SharedContext, intent: Option<LaunchIntent>) {
        if self.destroyed {
            tracing::warn!("attach after destroy ignored");
            return;
        }
        self.detach();
        // A missing intent behaves like a plain launch.
        let intent = intent.unwrap_or_default();
        let handle = self.client_handle();
        let (sessions, was_empty) = match context.lock() {
            Ok(ctx) => (ctx.sessions(), ctx.is_sessions_empty()),
            Err(_) => {
                tracing::warn!("Execution context lock poisoned, not attaching");
                return;
            }
        };
        let adopted = self.registry.adopt(sessions);
        self.context = Some(context);
        tracing::info!("Attached to execution context ({} session(s) adopted)", adopted);

        if self.registry.is_empty() {
            self.pending_initial = Some(intent.failsafe);
            let ready = handle.clone();
            self.with_context(|ctx| ctx.prepare_environment(ready));
        } else if intent.action == LaunchAction::Run && !was_empty {
            self.add_new_session(intent.failsafe, None);
        } else {
            let target = self
                .stored_current
                .filter(|id| self.registry.get(*id).is_some())
                .or_else(|| self.registry.last().map(|s| s.id));
            if let Some(id) = target {
                self.registry.set_current(id);
            }
        }
        self.launch_unlaunched();

        let visible = self.foreground.is_visible();
        self.with_context(|ctx| {
            ctx.set_session_client(handle);
            ctx.set_ui_visible(visible);
        });
        self.log_edge("attach");
    }

    /// Unset this host's client and let go of the context. The context and
    /// its sessions keep running.
    fn detach(&mut self) {
        if self.context.is_none() {
            return;
        }
        self.with_context(|ctx| ctx.unset_session_client());
        self.context = None;
        tracing::info!("Detached from execution context");
    }

    fn launch_unlaunched(&mut self) {
        let requests: Vec<LaunchRequest> = std::mem::take(&mut self.unlaunched)
            .into_iter()
            .filter_map(|id| self.registry.get(id))
            .filter(|s| s.state == SessionState::Starting)
            .map(LaunchRequest::from)
            .collect();
        for request in requests {
            let handle = self.client_handle();
            tracing::debug!("Launching session {} added before attach", request.id);
            self.with_context(|ctx| ctx.launch(request, handle));
        }
    }

    /// Run `f` against the attached context, if any.
    fn with_context<R>(&self, f: impl FnOnce(&mut DynContext) -> R) -> Option<R> {
        let context = self.context.as_ref()?;
        match context.lock() {
            Ok(mut ctx) => Some(f(&mut *ctx)),
            Err(_) => {
                tracing::warn!("Execution context lock poisoned");
                None
            }
        }
    }

    /// Add a session and ask the context to start it. Failures to start
    /// arrive later as a `LaunchFailed` notice.
    pub fn add_new_session(&mut self, failsafe: bool, name: Option<String>) -> Option<Session> {
        if self.destroyed {
            return None;
        }
        let session = self.registry.add_session(failsafe, name);
        let handle = self.client_handle();
        let request = LaunchRequest::from(&session);
        if self.with_context(|ctx| ctx.launch(request, handle)).is_none() {
            tracing::warn!(
                "No execution context attached; session {} stays starting",
                session.id
            );
            self.unlaunched.push(session.id);
        }
        self.flush_log();
        Some(session)
    }

    pub fn select_session(&mut self, id: SessionId) -> bool {
        let changed = self.registry.set_current(id);
        self.flush_log();
        changed
    }

    /// Ask the context to finish a running session. The registry updates
    /// when the exit is reported back.
    pub fn kill_session(&mut self, id: SessionId) -> bool {
        let running = self.registry.get(id).is_some_and(Session::is_running);
        if !running {
            return false;
        }
        self.with_context(|ctx| ctx.finish_if_running(id))
            .unwrap_or_default()
    }

    /// Drop a session from the list, finishing its process first if needed.
    pub fn close_session(&mut self, id: SessionId) -> bool {
        if self.registry.get(id).is_some_and(Session::is_running) {
            self.with_context(|ctx| ctx.finish_if_running(id));
        }
        let removed = self.registry.remove_session(id);
        self.flush_log();
        removed
    }

    pub fn on_start(&mut self) {
        if self.foreground.on_start() {
            self.with_context(|ctx| ctx.set_ui_visible(true));
            self.log_visibility(Visibility::Visible);
        }
    }

    pub fn on_stop(&mut self) {
        if self.foreground.on_stop() {
            self.with_context(|ctx| ctx.set_ui_visible(false));
            self.log_visibility(Visibility::Hidden);
        }
    }

    /// Tear down: the context forgets this host and every outstanding
    /// callback becomes stale. Sessions keep running in the context.
    pub fn on_destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.on_stop();
        self.detach();
        self.pending_initial = None;
        self.lifetime.invalidate();
        self.destroyed = true;
        self.log_edge("on_destroy");
    }

    /// The execution context went away underneath us. Returns true the
    /// first time, when the host starts finishing.
    pub fn on_context_disconnected(&mut self) -> bool {
        self.context = None;
        if self.finishing {
            return false;
        }
        self.finishing = true;
        self.log_edge("context_disconnected");
        true
    }

    pub fn save_state(&self) -> SavedState {
        let mut saved = SavedState::new();
        saved.set_toolbar_text(&self.toolbar_text);
        saved.mark_recreated();
        if let Some(id) = self.registry.current_id() {
            saved.set_current_session(id);
        }
        saved
    }

    /// Apply every pending callback. Returns how many were applied.
    pub fn process_callbacks(&mut self) -> usize {
        let (messages, discarded) = self.callbacks.drain();
        if discarded > 0 {
            if let Some(logger) = &self.logger {
                logger.log_discarded_callbacks(discarded);
            }
        }
        let applied = messages.len();
        for message in messages {
            self.apply(message);
        }
        self.flush_log();
        applied
    }

    /// Apply one message received through [`TerminalHost::next_callback`].
    pub fn apply_deferred(&mut self, deferred: Deferred) -> bool {
        match deferred.open() {
            Ok(message) => {
                self.apply(message);
                self.flush_log();
                true
            }
            Err(e) => {
                tracing::debug!("Discarding deferred callback: {}", e);
                if let Some(logger) = &self.logger {
                    logger.log_discarded_callbacks(1);
                }
                false
            }
        }
    }

    /// Wait for the next callback from background work.
    pub async fn next_callback(&mut self) -> Option<Deferred> {
        self.callbacks.recv().await
    }

    fn apply(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::SessionStarted { id, pid } => {
                if !self.registry.mark_running(id, pid) {
                    tracing::debug!("{}", SessionError::NotFound(id));
                }
            }
            ClientMessage::SessionFinished { id, exit_status } => {
                if !self.registry.mark_finished(id, exit_status) {
                    tracing::debug!("{}", SessionError::NotFound(id));
                    return;
                }
                tracing::info!("Session {} finished with status {}", id, exit_status);
                if self.foreground.is_visible() {
                    self.notices
                        .push(Notice::SessionFinished { id, exit_status });
                }
                if self.config.remove_finished_sessions {
                    self.registry.remove_session(id);
                }
            }
            ClientMessage::TitleChanged { id, title } => {
                self.registry.set_title(id, title);
            }
            ClientMessage::LaunchFailed { id, message } => {
                tracing::warn!("Session {} failed to start: {}", id, message);
                if let Some(logger) = &self.logger {
                    logger.log_launch_failure(Some(id), &message);
                }
                if self.registry.mark_finished(id, -1) && self.config.remove_finished_sessions {
                    self.registry.remove_session(id);
                }
                self.notices.push(Notice::LaunchFailed {
                    session: Some(id),
                    error: SessionError::ExternalLaunchFailure { message },
                });
            }
            ClientMessage::EnvironmentReady => {
                if let Some(failsafe) = self.pending_initial.take() {
                    self.add_new_session(failsafe, None);
                }
            }
            ClientMessage::EnvironmentFailed { message } => {
                tracing::warn!("Environment setup failed: {}", message);
                self.pending_initial = None;
                if let Some(logger) = &self.logger {
                    logger.log_launch_failure(None, &message);
                }
                self.notices.push(Notice::LaunchFailed {
                    session: None,
                    error: SessionError::ExternalLaunchFailure { message },
                });
            }
        }
    }

    /// Handle for reporting results back to this host.
    pub fn client_handle(&self) -> SessionClientHandle {
        self.callbacks.handle(self.lifetime.token())
    }

    fn flush_log(&mut self) {
        let (Some(logger), Some(feed)) = (&self.logger, self.log_feed.as_mut()) else {
            return;
        };
        while let Ok(event) = feed.try_recv() {
            logger.log_registry_event(&event);
        }
    }

    fn log_edge(&mut self, edge: &str) {
        self.flush_log();
        if let Some(logger) = &self.logger {
            logger.log_lifecycle(edge);
        }
    }

    fn log_visibility(&mut self, visibility: Visibility) {
        self.flush_log();
        if let Some(logger) = &self.logger {
            logger.log_visibility(visibility);
        }
    }

    /// Change feed for a session list adapter.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<RegistryEvent> {
        self.registry.subscribe()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.registry.current()
    }

    pub fn foreground(&self) -> &ForegroundCoordinator {
        &self.foreground
    }

    pub fn is_visible(&self) -> bool {
        self.foreground.is_visible()
    }

    pub fn toolbar_text(&self) -> &str {
        &self.toolbar_text
    }

    pub fn set_toolbar_text(&mut self, text: impl Into<String>) {
        self.toolbar_text = text.into();
    }

    pub fn was_recreated(&self) -> bool {
        self.recreated
    }

    pub fn is_attached(&self) -> bool {
        self.context.is_some()
    }

    pub fn is_finishing(&self) -> bool {
        self.finishing
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }
}

#[cfg(test)]
#[path = "tests/host_tests.rs"]
mod tests;
