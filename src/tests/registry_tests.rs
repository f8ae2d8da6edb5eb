//! Tests for the session registry.

use super::*;
use proptest::prelude::*;

fn drain(rx: &mut mpsc::UnboundedReceiver<RegistryEvent>) -> Vec<RegistryEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn test_new_registry_is_empty() {
    let registry = SessionRegistry::new();
    assert!(registry.is_empty());
    assert_eq!(registry.len(), 0);
    assert!(registry.current().is_none());
}

#[test]
fn test_add_makes_current() {
    let mut registry = SessionRegistry::new();
    let a = registry.add_session(false, Some("A".to_string()));
    assert_eq!(registry.current_id(), Some(a.id));

    let b = registry.add_session(false, Some("B".to_string()));
    assert_eq!(registry.current_id(), Some(b.id));
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.index_of(b.id), Some(1));
}

#[test]
fn test_add_add_remove_remove_scenario() {
    let mut registry = SessionRegistry::new();
    let a = registry.add_session(false, Some("A".to_string()));
    let b = registry.add_session(false, Some("B".to_string()));
    assert_eq!(registry.current().unwrap().title.as_deref(), Some("B"));

    assert!(registry.remove_session(b.id));
    assert_eq!(registry.current().unwrap().title.as_deref(), Some("A"));

    assert!(registry.remove_session(a.id));
    assert!(registry.current().is_none());
    assert!(registry.is_empty());
}

#[test]
fn test_remove_current_selects_most_recently_current() {
    let mut registry = SessionRegistry::new();
    let a = registry.add_session(false, None);
    let b = registry.add_session(false, None);
    let c = registry.add_session(false, None);

    // History: a, b, c -> select a -> b, c, a
    assert!(registry.set_current(a.id));
    assert!(registry.remove_session(a.id));
    assert_eq!(registry.current_id(), Some(c.id));

    assert!(registry.remove_session(c.id));
    assert_eq!(registry.current_id(), Some(b.id));
}

#[test]
fn test_remove_non_current_keeps_current() {
    let mut registry = SessionRegistry::new();
    let a = registry.add_session(false, None);
    let b = registry.add_session(false, None);

    assert!(registry.remove_session(a.id));
    assert_eq!(registry.current_id(), Some(b.id));
}

#[test]
fn test_remove_unknown_is_noop() {
    let mut registry = SessionRegistry::new();
    let a = registry.add_session(false, None);
    let mut rx = registry.subscribe();

    assert!(!registry.remove_session(SessionId(999)));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.current_id(), Some(a.id));
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn test_set_current_unknown_does_not_mutate() {
    let mut registry = SessionRegistry::new();
    let a = registry.add_session(false, None);
    registry.add_session(false, None);
    registry.set_current(a.id);
    let mut rx = registry.subscribe();

    assert!(!registry.set_current(SessionId(42)));
    assert_eq!(registry.current_id(), Some(a.id));
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn test_set_current_emits_change() {
    let mut registry = SessionRegistry::new();
    let a = registry.add_session(false, None);
    let b = registry.add_session(false, None);
    let mut rx = registry.subscribe();

    assert!(registry.set_current(a.id));
    assert_eq!(
        drain(&mut rx),
        vec![RegistryEvent::CurrentChanged {
            previous: Some(b.id),
            current: Some(a.id)
        }]
    );
}

#[test]
fn test_mutations_emit_events() {
    let mut registry = SessionRegistry::new();
    let mut rx = registry.subscribe();

    let a = registry.add_session(false, None);
    registry.mark_running(a.id, 100);
    registry.set_title(a.id, Some("vim".to_string()));
    registry.remove_session(a.id);

    assert_eq!(
        drain(&mut rx),
        vec![
            RegistryEvent::Added(a.id),
            RegistryEvent::CurrentChanged {
                previous: None,
                current: Some(a.id)
            },
            RegistryEvent::Updated(a.id),
            RegistryEvent::Updated(a.id),
            RegistryEvent::Removed(a.id),
            RegistryEvent::CurrentChanged {
                previous: Some(a.id),
                current: None
            },
        ]
    );
}

#[test]
fn test_closed_subscriber_is_pruned() {
    let mut registry = SessionRegistry::new();
    let rx = registry.subscribe();
    drop(rx);

    registry.add_session(false, None);
    assert!(registry.subscribers.is_empty());
}

#[test]
fn test_state_updates() {
    let mut registry = SessionRegistry::new();
    let a = registry.add_session(true, None);
    assert_eq!(registry.get(a.id).unwrap().state, SessionState::Starting);
    assert!(registry.get(a.id).unwrap().failsafe);

    assert!(registry.mark_running(a.id, 321));
    assert_eq!(registry.get(a.id).unwrap().pid(), Some(321));

    assert!(registry.mark_finished(a.id, 1));
    assert_eq!(
        registry.get(a.id).unwrap().state,
        SessionState::Finished { exit_status: 1 }
    );

    assert!(!registry.mark_running(SessionId(77), 1));
    assert!(!registry.set_title(SessionId(77), None));
}

#[test]
fn test_adopt_keeps_ids_and_skips_duplicates() {
    let mut registry = SessionRegistry::new();
    let existing = vec![
        Session::new(SessionId(5), false, Some("five".to_string())),
        Session::new(SessionId(9), false, None),
    ];

    assert_eq!(registry.adopt(existing.clone()), 2);
    assert_eq!(registry.adopt(existing), 0);
    assert_eq!(registry.len(), 2);
    assert!(registry.current().is_none());

    // Allocator moved past adopted ids
    let next = registry.add_session(false, None);
    assert_eq!(next.id, SessionId(10));
}

#[test]
fn test_adopt_skips_ids_out_of_range() {
    let mut registry = SessionRegistry::new();
    let existing = vec![
        Session::new(SessionId(u64::MAX), false, None),
        Session::new(SessionId(MAX_ADOPTED_ID + 1), false, None),
        Session::new(SessionId(MAX_ADOPTED_ID), false, None),
    ];

    assert_eq!(registry.adopt(existing), 1);
    assert!(registry.get(SessionId(u64::MAX)).is_none());
    let next = registry.add_session(false, None);
    assert_eq!(next.id, SessionId(MAX_ADOPTED_ID + 1));
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_ids_are_not_reused() {
    let mut registry = SessionRegistry::new();
    let a = registry.add_session(false, None);
    registry.remove_session(a.id);
    let b = registry.add_session(false, None);
    assert_ne!(a.id, b.id);
}

#[derive(Debug, Clone)]
enum Op {
    Add,
    Remove(usize),
    Select(usize),
    RemoveUnknown,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Add),
        2 => (0usize..8).prop_map(Op::Remove),
        2 => (0usize..8).prop_map(Op::Select),
        1 => Just(Op::RemoveUnknown),
    ]
}

proptest! {
    #[test]
    fn prop_current_is_none_or_live(ops in proptest::collection::vec(op_strategy(), 0..64)) {
        let mut registry = SessionRegistry::new();
        for op in ops {
            let before_len = registry.len();
            match op {
                Op::Add => {
                    let session = registry.add_session(false, None);
                    prop_assert_eq!(registry.current_id(), Some(session.id));
                }
                Op::Remove(i) => {
                    if let Some(id) = registry.sessions().get(i).map(|s| s.id) {
                        prop_assert!(registry.remove_session(id));
                        prop_assert_eq!(registry.len(), before_len - 1);
                        if registry.len() > 0 {
                            prop_assert!(registry.current().is_some());
                        }
                    }
                }
                Op::Select(i) => {
                    if let Some(id) = registry.sessions().get(i).map(|s| s.id) {
                        prop_assert!(registry.set_current(id));
                        prop_assert_eq!(registry.current_id(), Some(id));
                    }
                }
                Op::RemoveUnknown => {
                    let current = registry.current_id();
                    prop_assert!(!registry.remove_session(SessionId(u64::MAX)));
                    prop_assert_eq!(registry.current_id(), current);
                }
            }

            match registry.current_id() {
                None => prop_assert!(registry.is_empty()),
                Some(id) => prop_assert!(registry.get(id).is_some()),
            }
        }
    }
}
