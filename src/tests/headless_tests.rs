use super::*;
use crate::saved_state::SavedState;
use std::sync::{Arc, Weak};
use tempfile::tempdir;

fn host_with_ui() -> (TerminalHost, StyleReloadChannel, Arc<ConsoleUi>) {
    let channel = StyleReloadChannel::new();
    let ui = Arc::new(ConsoleUi::new(None));
    let target: Weak<dyn StyleReloadTarget> = Arc::downgrade(&ui) as Weak<dyn StyleReloadTarget>;
    let host = TerminalHost::new(HostConfig::default_config(), channel.clone(), target);
    (host, channel, ui)
}

fn run(driver: &HeadlessDriver, host: &mut TerminalHost, line: &str) -> (Flow, String) {
    let command = HeadlessCommand::parse(line).unwrap().unwrap();
    let mut out = Vec::new();
    let flow = driver.execute(host, command, &mut out).unwrap();
    (flow, String::from_utf8(out).unwrap())
}

#[test]
fn test_parse_commands() {
    assert_eq!(
        HeadlessCommand::parse("new").unwrap(),
        Some(HeadlessCommand::New {
            failsafe: false,
            name: None
        })
    );
    assert_eq!(
        HeadlessCommand::parse("  failsafe  rescue shell ").unwrap(),
        Some(HeadlessCommand::New {
            failsafe: true,
            name: Some("rescue shell".to_string())
        })
    );
    assert_eq!(
        HeadlessCommand::parse("select 3").unwrap(),
        Some(HeadlessCommand::Select(SessionId(3)))
    );
    assert_eq!(
        HeadlessCommand::parse("kill 12").unwrap(),
        Some(HeadlessCommand::Kill(SessionId(12)))
    );
    assert_eq!(
        HeadlessCommand::parse("ls").unwrap(),
        Some(HeadlessCommand::List)
    );
    assert_eq!(
        HeadlessCommand::parse("exit").unwrap(),
        Some(HeadlessCommand::Quit)
    );
    assert_eq!(HeadlessCommand::parse("   ").unwrap(), None);
}

#[test]
fn test_parse_errors() {
    let err = HeadlessCommand::parse("select").unwrap_err();
    assert!(err.to_string().contains("needs a session id"));

    let err = HeadlessCommand::parse("kill abc").unwrap_err();
    assert!(err.to_string().contains("invalid session id"));

    let err = HeadlessCommand::parse("frobnicate").unwrap_err();
    assert!(err.to_string().contains("unknown command"));
}

#[test]
fn test_new_select_and_list() {
    let (mut host, channel, _ui) = host_with_ui();
    let driver = HeadlessDriver::new(channel, None);

    assert_eq!(run(&driver, &mut host, "new build").1, "added 1\n");
    assert_eq!(run(&driver, &mut host, "failsafe").1, "added 2\n");
    assert_eq!(run(&driver, &mut host, "select 1").1, "");

    let (_, listing) = run(&driver, &mut host, "list");
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with('*'));
    assert!(lines[0].contains("build"));
    assert!(lines[1].contains("[2] failsafe"));
    assert!(lines[1].contains("starting"));

    assert_eq!(
        run(&driver, &mut host, "select 9").1,
        "error: session 9 not found\n"
    );
}

#[test]
fn test_empty_list() {
    let (mut host, channel, _ui) = host_with_ui();
    let driver = HeadlessDriver::new(channel, None);
    assert_eq!(run(&driver, &mut host, "list").1, "(no sessions)\n");
}

#[test]
fn test_kill_and_close_report_errors() {
    let (mut host, channel, _ui) = host_with_ui();
    let driver = HeadlessDriver::new(channel, None);
    run(&driver, &mut host, "new");

    assert_eq!(
        run(&driver, &mut host, "kill 1").1,
        "error: session 1 is not running\n"
    );
    assert_eq!(run(&driver, &mut host, "close 1").1, "");
    assert!(host.registry().is_empty());
    assert_eq!(
        run(&driver, &mut host, "close 1").1,
        "error: session 1 not found\n"
    );
}

#[test]
fn test_reload_deferred_until_show() {
    let (mut host, channel, ui) = host_with_ui();
    let driver = HeadlessDriver::new(channel, None);

    assert_eq!(run(&driver, &mut host, "reload").1, "style version 1\n");
    assert_eq!(run(&driver, &mut host, "reload").1, "style version 2\n");
    assert_eq!(ui.reload_count(), 0);

    run(&driver, &mut host, "show");
    assert!(host.is_visible());
    assert_eq!(ui.reload_count(), 1);
    assert!(ui.last_config().is_some());

    run(&driver, &mut host, "reload");
    assert_eq!(ui.reload_count(), 2);

    run(&driver, &mut host, "hide");
    assert!(!host.is_visible());
}

#[test]
fn test_console_ui_reads_config_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "shell: /bin/bash\n").unwrap();

    let ui = ConsoleUi::new(Some(path));
    ui.reload_style();
    assert_eq!(ui.last_config().unwrap().shell, "/bin/bash");
}

#[test]
fn test_console_ui_keeps_last_good_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "shell: /bin/zsh\n").unwrap();

    let ui = ConsoleUi::new(Some(path.clone()));
    ui.reload_style();
    std::fs::write(&path, "shell: [not, a, string\n").unwrap();
    ui.reload_style();

    assert_eq!(ui.reload_count(), 2);
    assert_eq!(ui.last_config().unwrap().shell, "/bin/zsh");
}

#[test]
fn test_save_writes_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("saved-state.json");
    let (mut host, channel, _ui) = host_with_ui();
    let driver = HeadlessDriver::new(channel, Some(path.clone()));

    run(&driver, &mut host, "new");
    run(&driver, &mut host, "toolbar ls -la");
    let (_, output) = run(&driver, &mut host, "save");
    assert!(output.starts_with("saved "));

    let saved = SavedState::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved.toolbar_text(), Some("ls -la"));
    assert_eq!(saved.current_session(), Some(SessionId(1)));
}

#[test]
fn test_save_without_path() {
    let (mut host, channel, _ui) = host_with_ui();
    let driver = HeadlessDriver::new(channel, None);
    assert_eq!(
        run(&driver, &mut host, "save").1,
        "error: no saved state path\n"
    );
}

#[test]
fn test_quit_stops() {
    let (mut host, channel, _ui) = host_with_ui();
    let driver = HeadlessDriver::new(channel, None);
    assert_eq!(run(&driver, &mut host, "quit").0, Flow::Quit);
    assert_eq!(run(&driver, &mut host, "help").0, Flow::Continue);
}

#[test]
fn test_notices_are_printed() {
    let (mut host, _channel, _ui) = host_with_ui();
    host.on_start();
    let session = host.add_new_session(false, None).unwrap();
    let client = host.client_handle();
    client.session_started(session.id, 5);
    client.session_finished(session.id, 2);
    host.process_callbacks();

    let mut out = Vec::new();
    write_notices(&mut host, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "session 1 finished (2)\n");
}
