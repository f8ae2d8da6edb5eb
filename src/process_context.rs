//! Execution context backed by local shell processes.
//!
//! Each session runs `shell` (or `failsafe_shell`) as a child process. The
//! child is awaited on its own tokio task; exit and spawn errors are reported
//! through the session client handle. Must be used inside a tokio runtime.
//!
//! Children belong to the context, not to whichever host is attached. A host
//! that detaches leaves them running, and exits are reported to the client
//! attached at that time.

use crate::callbacks::SessionClientHandle;
use crate::config::HostConfig;
use crate::context::{ExecutionContext, LaunchRequest};
use crate::session::{Session, SessionId, SessionState};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::process::{ChildStdin, Command};
use tokio::sync::oneshot;

/// Environment variable carrying the session id into the child.
pub const SESSION_ID_ENV: &str = "TERMHOST_SESSION_ID";
/// Environment variable carrying the session name, when it has one.
pub const SESSION_NAME_ENV: &str = "TERMHOST_SESSION_NAME";

/// Client currently attached, shared with the per-session wait tasks.
type ClientSlot = Arc<Mutex<Option<SessionClientHandle>>>;

struct ProcessEntry {
    session: Session,
    running: Arc<AtomicBool>,
    kill: Option<oneshot::Sender<()>>,
    // Held open so interactive shells don't exit on EOF.
    _stdin: Option<ChildStdin>,
}

pub struct ProcessContext {
    config: HostConfig,
    entries: Vec<ProcessEntry>,
    client: ClientSlot,
    ui_visible: bool,
}

impl ProcessContext {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
            client: Arc::new(Mutex::new(None)),
            ui_visible: false,
        }
    }

    fn build_command(&self, request: &LaunchRequest) -> Command {
        let (program, args) = self.config.command_for(request.failsafe);
        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.env(SESSION_ID_ENV, request.id.to_string());
        if let Some(name) = &request.name {
            cmd.env(SESSION_NAME_ENV, name);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    pub fn has_client(&self) -> bool {
        current_client(&self.client).is_some()
    }

    fn replace_client(&mut self, client: Option<SessionClientHandle>) {
        match self.client.lock() {
            Ok(mut slot) => *slot = client,
            Err(_) => tracing::warn!("Session client slot poisoned"),
        }
    }

    pub fn is_ui_visible(&self) -> bool {
        self.ui_visible
    }

    fn prune(&mut self) {
        self.entries.retain(|e| e.running.load(Ordering::SeqCst));
    }
}

impl ExecutionContext for ProcessContext {
    fn is_sessions_empty(&self) -> bool {
        !self
            .entries
            .iter()
            .any(|e| e.running.load(Ordering::SeqCst))
    }

    fn sessions(&self) -> Vec<Session> {
        self.entries
            .iter()
            .filter(|e| e.running.load(Ordering::SeqCst))
            .map(|e| e.session.clone())
            .collect()
    }

    fn set_session_client(&mut self, client: SessionClientHandle) {
        self.replace_client(Some(client));
    }

    fn unset_session_client(&mut self) {
        self.replace_client(None);
    }

    fn launch(&mut self, request: LaunchRequest, client: SessionClientHandle) {
        self.prune();
        let mut child = match self.build_command(&request).spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!("Failed to spawn session {}: {}", request.id, e);
                client.launch_failed(request.id, e.to_string());
                return;
            }
        };

        let Some(pid) = child.id() else {
            client.launch_failed(request.id, "process exited before reporting a pid");
            return;
        };
        tracing::info!("Session {} started (pid {})", request.id, pid);
        client.session_started(request.id, pid);

        let running = Arc::new(AtomicBool::new(true));
        let (kill_tx, kill_rx) = oneshot::channel();
        let mut session = Session::new(request.id, request.failsafe, request.name.clone());
        session.state = SessionState::Running { pid };
        self.entries.push(ProcessEntry {
            session,
            running: Arc::clone(&running),
            kill: Some(kill_tx),
            _stdin: child.stdin.take(),
        });

        let id = request.id;
        let slot = Arc::clone(&self.client);
        tokio::spawn(async move {
            // Only an explicit finish kills. A dropped sender means the
            // context went away and the child is left alone.
            let kill = async move {
                if kill_rx.await.is_err() {
                    std::future::pending::<()>().await;
                }
            };
            let exited = tokio::select! {
                status = child.wait() => Some(status),
                _ = kill => None,
            };
            let status = match exited {
                Some(status) => status,
                None => {
                    if let Err(e) = child.start_kill() {
                        tracing::warn!("Failed to kill session {}: {}", id, e);
                    }
                    child.wait().await
                }
            };
            running.store(false, Ordering::SeqCst);
            let exit_status = match status {
                Ok(status) => exit_code(status),
                Err(e) => {
                    tracing::warn!("Failed to wait for session {}: {}", id, e);
                    -1
                }
            };
            current_client(&slot)
                .unwrap_or(client)
                .session_finished(id, exit_status);
        });
    }

    fn finish_if_running(&mut self, id: SessionId) -> bool {
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.session.id == id && e.running.load(Ordering::SeqCst))
        else {
            return false;
        };
        match entry.kill.take() {
            Some(kill) => kill.send(()).is_ok(),
            None => false,
        }
    }

    fn set_ui_visible(&mut self, visible: bool) {
        tracing::debug!("UI visible: {}", visible);
        self.ui_visible = visible;
    }
}

fn current_client(slot: &ClientSlot) -> Option<SessionClientHandle> {
    slot.lock().ok().and_then(|client| client.clone())
}

/// Exit code, or 128 + signal number for signal deaths, or -1.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}
