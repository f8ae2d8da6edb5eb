use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use termhost::config::HostConfig;
use termhost::context::SharedContext;
use termhost::foreground::StyleReloadTarget;
use termhost::headless::{save_state_to, ConsoleUi, HeadlessDriver};
use termhost::host::{LaunchAction, LaunchIntent, TerminalHost};
use termhost::paths;
use termhost::process_context::ProcessContext;
use termhost::saved_state::SavedState;
use termhost::structured_logger::StructuredLogger;
use termhost::style_reload::StyleReloadChannel;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "termhost")]
#[command(about = "Headless terminal session host")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.termhost/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start the first session with the failsafe shell
    #[arg(long)]
    failsafe: bool,

    /// Add a new session on startup even if sessions are running
    #[arg(long)]
    run: bool,

    /// Write tracing output to stderr instead of logs/debug.log
    #[arg(long)]
    log_stderr: bool,

    /// Disable logs/events.jsonl
    #[arg(long)]
    no_event_log: bool,
}

fn init_tracing(log_stderr: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = if log_stderr {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        let path = paths::debug_log_path()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open debug log: {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}

fn load_saved_state(path: &Path) -> Option<SavedState> {
    let content = std::fs::read_to_string(path).ok()?;
    match SavedState::from_json(&content) {
        Ok(saved) => Some(saved),
        Err(e) => {
            tracing::warn!("Ignoring unreadable saved state {}: {}", path.display(), e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_stderr)?;
    tracing::info!("termhost starting (git {})", termhost::GIT_SHA);

    let config_path = match cli.config {
        Some(path) => path,
        None => paths::config_path()?,
    };
    let config = HostConfig::load_or_default(&config_path)?;

    let channel = StyleReloadChannel::global().clone();
    let ui = Arc::new(ConsoleUi::new(Some(config_path)));
    let target: Weak<dyn StyleReloadTarget> = Arc::downgrade(&ui) as Weak<dyn StyleReloadTarget>;
    let mut host = TerminalHost::new(config.clone(), channel.clone(), target);

    if config.event_log && !cli.no_event_log {
        let host_id = uuid::Uuid::new_v4().to_string();
        let logger = StructuredLogger::new(&host_id, &paths::logs_dir()?)
            .context("Failed to open event log")?;
        tracing::info!("Event log: {}", logger.path().display());
        host = host.with_logger(Arc::new(logger));
    }

    let saved_state_path = paths::saved_state_path()?;
    let saved = load_saved_state(&saved_state_path);
    host.on_create(saved.as_ref());

    let intent = LaunchIntent {
        action: if cli.run {
            LaunchAction::Run
        } else {
            LaunchAction::Main
        },
        failsafe: cli.failsafe,
    };
    let context: SharedContext = Arc::new(Mutex::new(ProcessContext::new(config)));
    host.attach(context, Some(intent));
    host.on_start();

    eprintln!(
        "termhost {} ({}), type 'help' for commands",
        env!("CARGO_PKG_VERSION"),
        termhost::GIT_SHA
    );
    let driver = HeadlessDriver::new(channel, Some(saved_state_path.clone()));
    let result = driver.run(&mut host).await;

    if let Err(e) = save_state_to(&host, &saved_state_path) {
        tracing::warn!("Failed to save state: {:#}", e);
    }
    host.on_stop();
    host.on_destroy();
    result
}
