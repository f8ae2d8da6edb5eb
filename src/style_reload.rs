//! Process-wide style reload signal.
//!
//! `StyleReloadChannel` replaces an ambient OS broadcast with an explicit
//! publish/subscribe point. Listeners take no parameters: each one re-reads
//! whatever configuration it needs. Registration is tied to the lifetime of
//! the returned [`Subscription`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

type Listener = Arc<dyn Fn() + Send + Sync>;

/// Shared handle to the channel's version counter.
///
/// Consumers cache the version they last rendered against and compare it
/// with this to skip redundant reloads.
#[derive(Clone, Debug, Default)]
pub struct StyleVersion(Arc<AtomicU64>);

impl StyleVersion {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

struct Inner {
    version: StyleVersion,
    next_listener_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
}

/// Publish point for "style changed, reload" notifications.
#[derive(Clone)]
pub struct StyleReloadChannel {
    inner: Arc<Inner>,
}

impl StyleReloadChannel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                version: StyleVersion::default(),
                next_listener_id: AtomicU64::new(0),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The channel shared by the whole process.
    pub fn global() -> &'static StyleReloadChannel {
        static GLOBAL: OnceLock<StyleReloadChannel> = OnceLock::new();
        GLOBAL.get_or_init(StyleReloadChannel::new)
    }

    /// Register a listener. It stays registered until the returned
    /// subscription is dropped.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut listeners) = self.inner.listeners.lock() {
            listeners.push((id, Arc::new(listener)));
        }
        Subscription {
            channel: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Bump the style version and notify every listener once, in
    /// registration order. Returns the new version.
    ///
    /// Listeners run on the caller's thread with the registration lock
    /// released, so they may subscribe or unsubscribe.
    pub fn publish_reload(&self) -> u64 {
        let version = self.inner.version.bump();
        let snapshot: Vec<Listener> = match self.inner.listeners.lock() {
            Ok(listeners) => listeners.iter().map(|(_, l)| Arc::clone(l)).collect(),
            Err(_) => Vec::new(),
        };
        tracing::debug!(
            "Publishing style reload v{} to {} listener(s)",
            version,
            snapshot.len()
        );
        for listener in snapshot {
            listener();
        }
        version
    }

    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    pub fn style_version(&self) -> StyleVersion {
        self.inner.version.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }
}

impl Default for StyleReloadChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Listener registration. Dropping it deregisters the listener.
pub struct Subscription {
    channel: Weak<Inner>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.channel.upgrade() {
            if let Ok(mut listeners) = inner.listeners.lock() {
                listeners.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Arc<AtomicU64>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_publish_invokes_each_listener_once() {
        let channel = StyleReloadChannel::new();
        let (first, l1) = counter();
        let (second, l2) = counter();
        let (third, l3) = counter();
        let _s1 = channel.subscribe(l1);
        let _s2 = channel.subscribe(l2);
        let _s3 = channel.subscribe(l3);

        let before = channel.version();
        assert_eq!(channel.publish_reload(), before + 1);
        assert_eq!(channel.version(), before + 1);

        for count in [&first, &second, &third] {
            assert_eq!(count.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let channel = StyleReloadChannel::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut subs = Vec::new();
        for i in 0..4 {
            let order = Arc::clone(&order);
            subs.push(channel.subscribe(move || order.lock().unwrap().push(i)));
        }

        channel.publish_reload();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_dropping_subscription_deregisters() {
        let channel = StyleReloadChannel::new();
        let (count, listener) = counter();
        let sub = channel.subscribe(listener);
        assert_eq!(channel.listener_count(), 1);

        drop(sub);
        assert_eq!(channel.listener_count(), 0);

        channel.publish_reload();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(channel.version(), 1);
    }

    #[test]
    fn test_subscription_outliving_channel() {
        let channel = StyleReloadChannel::new();
        let (_, listener) = counter();
        let sub = channel.subscribe(listener);
        drop(channel);
        drop(sub);
    }

    #[test]
    fn test_listener_may_subscribe_during_publish() {
        let channel = StyleReloadChannel::new();
        let late = Arc::new(Mutex::new(Vec::new()));
        let ch = channel.clone();
        let late_subs = Arc::clone(&late);
        let _sub = channel.subscribe(move || {
            late_subs.lock().unwrap().push(ch.subscribe(|| {}));
        });

        channel.publish_reload();
        assert_eq!(channel.listener_count(), 2);
        late.lock().unwrap().clear();
        assert_eq!(channel.listener_count(), 1);
    }

    #[test]
    fn test_style_version_handle_tracks_channel() {
        let channel = StyleReloadChannel::new();
        let version = channel.style_version();
        channel.publish_reload();
        channel.publish_reload();
        assert_eq!(version.get(), 2);
    }

    #[test]
    fn test_global_is_shared() {
        let a = StyleReloadChannel::global();
        let b = StyleReloadChannel::global();
        assert!(Arc::ptr_eq(&a.inner, &b.inner));
    }
}
