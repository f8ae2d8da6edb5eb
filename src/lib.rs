//! Session registry and foreground coordination for a terminal front end.
//!
//! [`registry::SessionRegistry`] owns the ordered session list and the
//! current selection. [`foreground::ForegroundCoordinator`] tracks UI
//! visibility and gates [`style_reload::StyleReloadChannel`] notifications.
//! [`host::TerminalHost`] wires both to an [`context::ExecutionContext`].

pub mod callbacks;
pub mod config;
pub mod context;
pub mod errors;
pub mod foreground;
pub mod headless;
pub mod host;
pub mod lifetime;
pub mod paths;
pub mod process_context;
pub mod registry;
pub mod saved_state;
pub mod session;
pub mod structured_logger;
pub mod style_reload;

/// Git commit the binary was built from.
pub const GIT_SHA: &str = env!("TERMHOST_GIT_SHA");
