//! Owner liveness tokens for deferred callbacks.
//!
//! Background work cannot hold a reference to the owner. Instead it carries
//! an [`OwnerToken`]; before a deferred callback touches shared state it asks
//! the token whether the owner that issued it is still live.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generation counter for one owner (one host instance).
///
/// Every `invalidate` bumps the generation, so all tokens issued before it
/// stop being live. Dropping the lifetime invalidates it.
#[derive(Debug, Default)]
pub struct OwnerLifetime {
    generation: Arc<AtomicU64>,
    issued: AtomicU64,
}

impl OwnerLifetime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token bound to the current generation.
    pub fn token(&self) -> OwnerToken {
        self.issued.fetch_add(1, Ordering::Relaxed);
        OwnerToken {
            generation: Arc::clone(&self.generation),
            issued_at: self.generation.load(Ordering::SeqCst),
        }
    }

    /// Tear down: every outstanding token becomes stale.
    pub fn invalidate(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(
            "Owner invalidated (generation {}, {} token(s) issued)",
            generation,
            self.issued.load(Ordering::Relaxed)
        );
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl Drop for OwnerLifetime {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Liveness proof carried by deferred work.
#[derive(Debug, Clone)]
pub struct OwnerToken {
    generation: Arc<AtomicU64>,
    issued_at: u64,
}

impl OwnerToken {
    pub fn is_live(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.issued_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_live_until_invalidate() {
        let lifetime = OwnerLifetime::new();
        let token = lifetime.token();
        assert!(token.is_live());

        lifetime.invalidate();
        assert!(!token.is_live());
    }

    #[test]
    fn test_new_tokens_after_invalidate_are_live() {
        let lifetime = OwnerLifetime::new();
        let old = lifetime.token();
        lifetime.invalidate();
        let fresh = lifetime.token();

        assert!(!old.is_live());
        assert!(fresh.is_live());
        assert_eq!(lifetime.generation(), 1);
    }

    #[test]
    fn test_dropping_lifetime_stales_tokens() {
        let lifetime = OwnerLifetime::new();
        let token = lifetime.token();
        drop(lifetime);
        assert!(!token.is_live());
    }
}
