//! Foreground/background coordination.
//!
//! The coordinator is the only place that decides whether a style reload is
//! applied right away (UI visible) or deferred to the next visible edge.
//! Deferred reloads are coalesced through the style version: however many
//! reloads were published while hidden, one reload is applied on return.

use crate::style_reload::{StyleReloadChannel, StyleVersion, Subscription};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Visibility {
    #[default]
    Hidden,
    Visible,
}

/// Whatever re-reads style configuration and re-renders (the UI).
pub trait StyleReloadTarget: Send + Sync {
    fn reload_style(&self);
}

/// Tracks UI visibility and arms style reload listening while visible.
///
/// Holds only a weak reference to the target: it dispatches notifications
/// to the UI but never controls it.
pub struct ForegroundCoordinator {
    channel: StyleReloadChannel,
    target: Weak<dyn StyleReloadTarget>,
    visibility: Visibility,
    subscription: Option<Subscription>,
    applied_version: Arc<AtomicU64>,
    arm_count: u64,
}

impl ForegroundCoordinator {
    pub fn new(channel: StyleReloadChannel, target: Weak<dyn StyleReloadTarget>) -> Self {
        // Start in sync with the channel: nothing published before we existed
        // needs replaying.
        let applied_version = Arc::new(AtomicU64::new(channel.version()));
        Self {
            channel,
            target,
            visibility: Visibility::Hidden,
            subscription: None,
            applied_version,
            arm_count: 0,
        }
    }

    /// Hidden -> Visible. Returns false if already visible.
    pub fn on_start(&mut self) -> bool {
        if self.visibility == Visibility::Visible {
            return false;
        }
        self.visibility = Visibility::Visible;
        self.arm();
        self.catch_up();
        true
    }

    /// Visible -> Hidden. Returns false if already hidden.
    pub fn on_stop(&mut self) -> bool {
        if self.visibility == Visibility::Hidden {
            return false;
        }
        self.visibility = Visibility::Hidden;
        self.subscription = None;
        tracing::debug!("Style reload listening disarmed");
        true
    }

    fn arm(&mut self) {
        let target = self.target.clone();
        let applied = Arc::clone(&self.applied_version);
        let version = self.channel.style_version();
        self.subscription = Some(self.channel.subscribe(move || {
            dispatch(&target, &applied, &version);
        }));
        self.arm_count += 1;
        tracing::debug!("Style reload listening armed (#{})", self.arm_count);
    }

    fn catch_up(&self) {
        let version = self.channel.style_version();
        if version.get() > self.applied_version.load(Ordering::SeqCst) {
            tracing::debug!("Applying style reload deferred while hidden");
            dispatch(&self.target, &self.applied_version, &version);
        }
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }

    pub fn is_armed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Number of Hidden -> Visible arm operations so far.
    pub fn arm_count(&self) -> u64 {
        self.arm_count
    }

    /// Style version the target last reloaded against.
    pub fn applied_version(&self) -> u64 {
        self.applied_version.load(Ordering::SeqCst)
    }
}

fn dispatch(target: &Weak<dyn StyleReloadTarget>, applied: &AtomicU64, version: &StyleVersion) {
    let current = version.get();
    let previous = applied.fetch_max(current, Ordering::SeqCst);
    if previous >= current {
        return;
    }
    match target.upgrade() {
        Some(target) => target.reload_style(),
        None => tracing::debug!("Style reload target dropped, skipping"),
    }
}

#[cfg(test)]
#[path = "tests/foreground_tests.rs"]
mod tests;
