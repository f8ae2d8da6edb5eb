//! Line-command front end for running the host without a UI.
//!
//! Commands are read from stdin, one per line; output goes to stdout.
//! Callbacks from the execution context are applied between commands.

use crate::callbacks::Deferred;
use crate::config::HostConfig;
use crate::foreground::StyleReloadTarget;
use crate::host::{Notice, TerminalHost};
use crate::session::SessionId;
use crate::style_reload::StyleReloadChannel;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "commands: new [name] | failsafe [name] | select <id> | kill <id> | \
close <id> | list | show | hide | reload | toolbar [text] | save | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadlessCommand {
    New { failsafe: bool, name: Option<String> },
    Select(SessionId),
    Kill(SessionId),
    Close(SessionId),
    List,
    Show,
    Hide,
    Reload,
    Toolbar(String),
    Save,
    Help,
    Quit,
}

impl HeadlessCommand {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let name = (!rest.is_empty()).then(|| rest.to_string());

        let command = match word {
            "new" => Self::New {
                failsafe: false,
                name,
            },
            "failsafe" => Self::New {
                failsafe: true,
                name,
            },
            "select" => Self::Select(parse_id(word, rest)?),
            "kill" => Self::Kill(parse_id(word, rest)?),
            "close" => Self::Close(parse_id(word, rest)?),
            "list" | "ls" => Self::List,
            "show" => Self::Show,
            "hide" => Self::Hide,
            "reload" => Self::Reload,
            "toolbar" => Self::Toolbar(rest.to_string()),
            "save" => Self::Save,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => anyhow::bail!("unknown command '{}'", other),
        };
        Ok(Some(command))
    }
}

fn parse_id(word: &str, rest: &str) -> Result<SessionId> {
    if rest.is_empty() {
        anyhow::bail!("'{}' needs a session id", word);
    }
    rest.parse::<SessionId>()
        .with_context(|| format!("invalid session id '{}'", rest))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Console stand-in for the rendering surface.
///
/// On a style reload it re-reads the config file, the way a UI re-reads
/// its color and font settings.
pub struct ConsoleUi {
    config_path: Option<PathBuf>,
    reloads: AtomicU64,
    last_config: Mutex<Option<HostConfig>>,
}

impl ConsoleUi {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            reloads: AtomicU64::new(0),
            last_config: Mutex::new(None),
        }
    }

    pub fn reload_count(&self) -> u64 {
        self.reloads.load(Ordering::SeqCst)
    }

    pub fn last_config(&self) -> Option<HostConfig> {
        self.last_config.lock().ok().and_then(|c| c.clone())
    }
}

impl StyleReloadTarget for ConsoleUi {
    fn reload_style(&self) {
        let count = self.reloads.fetch_add(1, Ordering::SeqCst) + 1;
        let loaded = match &self.config_path {
            Some(path) => HostConfig::load_or_default(path),
            None => Ok(HostConfig::default_config()),
        };
        match loaded {
            Ok(config) => {
                tracing::info!("Style reloaded (#{})", count);
                if let Ok(mut last) = self.last_config.lock() {
                    *last = Some(config);
                }
            }
            Err(e) => tracing::warn!("Style reload failed: {:#}", e),
        }
    }
}

/// Executes commands against a [`TerminalHost`].
pub struct HeadlessDriver {
    channel: StyleReloadChannel,
    saved_state_path: Option<PathBuf>,
}

impl HeadlessDriver {
    pub fn new(channel: StyleReloadChannel, saved_state_path: Option<PathBuf>) -> Self {
        Self {
            channel,
            saved_state_path,
        }
    }

    pub fn execute(
        &self,
        host: &mut TerminalHost,
        command: HeadlessCommand,
        out: &mut impl Write,
    ) -> Result<Flow> {
        match command {
            HeadlessCommand::New { failsafe, name } => match host.add_new_session(failsafe, name)
            {
                Some(session) => writeln!(out, "added {}", session.id)?,
                None => writeln!(out, "error: host is shut down")?,
            },
            HeadlessCommand::Select(id) => {
                if !host.select_session(id) {
                    writeln!(out, "error: session {} not found", id)?;
                }
            }
            HeadlessCommand::Kill(id) => {
                if !host.kill_session(id) {
                    writeln!(out, "error: session {} is not running", id)?;
                }
            }
            HeadlessCommand::Close(id) => {
                if !host.close_session(id) {
                    writeln!(out, "error: session {} not found", id)?;
                }
            }
            HeadlessCommand::List => write_list(host, out)?,
            HeadlessCommand::Show => host.on_start(),
            HeadlessCommand::Hide => host.on_stop(),
            HeadlessCommand::Reload => {
                let version = self.channel.publish_reload();
                writeln!(out, "style version {}", version)?;
            }
            HeadlessCommand::Toolbar(text) => host.set_toolbar_text(text),
            HeadlessCommand::Save => self.save(host, out)?,
            HeadlessCommand::Help => writeln!(out, "{}", HELP)?,
            HeadlessCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn save(&self, host: &TerminalHost, out: &mut impl Write) -> Result<()> {
        let Some(path) = &self.saved_state_path else {
            writeln!(out, "error: no saved state path")?;
            return Ok(());
        };
        save_state_to(host, path)?;
        writeln!(out, "saved {}", path.display())?;
        Ok(())
    }

    /// Read commands from stdin until `quit` or EOF.
    pub async fn run(&self, host: &mut TerminalHost) -> Result<()> {
        enum Input {
            Line(std::io::Result<Option<String>>),
            Callback(Option<Deferred>),
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut out = std::io::stdout();

        loop {
            let input = tokio::select! {
                line = lines.next_line() => Input::Line(line),
                deferred = host.next_callback() => Input::Callback(deferred),
            };

            match input {
                Input::Line(line) => {
                    let Some(line) = line.context("Failed to read command")? else {
                        break;
                    };
                    match HeadlessCommand::parse(&line) {
                        Ok(Some(command)) => {
                            if self.execute(host, command, &mut out)? == Flow::Quit {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => writeln!(out, "error: {:#}", e)?,
                    }
                }
                Input::Callback(Some(deferred)) => {
                    host.apply_deferred(deferred);
                }
                // The host holds a sender, so this only happens on teardown.
                Input::Callback(None) => break,
            }

            host.process_callbacks();
            write_notices(host, &mut out)?;
            out.flush()?;
        }
        Ok(())
    }
}

pub fn save_state_to(host: &TerminalHost, path: &std::path::Path) -> Result<()> {
    let json = host
        .save_state()
        .to_json()
        .context("Failed to serialize saved state")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write saved state: {}", path.display()))
}

fn write_list(host: &TerminalHost, out: &mut impl Write) -> Result<()> {
    let current = host.registry().current_id();
    if host.registry().is_empty() {
        writeln!(out, "(no sessions)")?;
    }
    for session in host.registry().sessions() {
        let marker = if Some(session.id) == current { '*' } else { ' ' };
        writeln!(
            out,
            "{} {:>3}  {:<20} {}",
            marker,
            session.id,
            session.display_title(),
            session.state
        )?;
    }
    Ok(())
}

fn write_notices(host: &mut TerminalHost, out: &mut impl Write) -> Result<()> {
    for notice in host.take_notices() {
        match notice {
            Notice::LaunchFailed { session, error } => match session {
                Some(id) => writeln!(out, "error: session {}: {}", id, error)?,
                None => writeln!(out, "error: {}", error)?,
            },
            Notice::SessionFinished { id, exit_status } => {
                writeln!(out, "session {} finished ({})", id, exit_status)?
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/headless_tests.rs"]
mod tests;
