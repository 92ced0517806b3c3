use std::fmt;

use crate::coordination::CoordinationContext;
use crate::store::{Expiry, SetOptions};

/// Token proving ownership of one acquisition. Fresh UUID v4 every time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerToken(String);

impl OwnerToken {
    fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Distributed lock manager.
///
/// Never fails loudly: contention, an unavailable store and store errors all
/// come back as "not acquired" / "not released".
#[derive(Debug, Clone)]
pub struct LockManager {
    ctx: CoordinationContext,
}

impl LockManager {
    pub fn new(ctx: CoordinationContext) -> Self {
        Self { ctx }
    }

    /// Try once to take `key` for `ttl_ms` milliseconds.
    ///
    /// Returns the owner token on success, `None` when another holder has the
    /// lock or the store cannot be reached. There is no retry.
    pub async fn acquire(&self, key: &str, ttl_ms: u64) -> Option<OwnerToken> {
        let store = self.ctx.store();
        if !store.is_available() {
            tracing::debug!(lock_key = %key, "Store unavailable, lock not acquired");
            return None;
        }

        let token = OwnerToken::generate();
        let store_key = self.ctx.keys().lock_key(key);
        let options = SetOptions::absent_with_expiry(Expiry::Milliseconds(ttl_ms));

        match store.set(&store_key, token.as_str(), options).await {
            Ok(true) => {
                tracing::debug!(lock_key = %key, ttl_ms, "Lock acquired");
                Some(token)
            }
            Ok(false) => {
                tracing::trace!(lock_key = %key, "Lock held elsewhere");
                None
            }
            Err(e) => {
                tracing::warn!(lock_key = %key, error = %e, "Lock acquisition failed");
                None
            }
        }
    }

    /// Acquire with `coordination.default_lock_ttl_ms`.
    pub async fn acquire_default(&self, key: &str) -> Option<OwnerToken> {
        self.acquire(key, self.ctx.config().default_lock_ttl_ms).await
    }

    /// Release `key` if it is still held by `token`.
    ///
    /// Returns `false` when the lock expired, was taken over, or the store
    /// failed; a foreign holder's lock is never removed.
    pub async fn release(&self, key: &str, token: &OwnerToken) -> bool {
        let store = self.ctx.store();
        if !store.is_available() {
            tracing::debug!(lock_key = %key, "Store unavailable, lock left to expire");
            return false;
        }

        let store_key = self.ctx.keys().lock_key(key);
        match store.compare_and_delete(&store_key, token.as_str()).await {
            Ok(true) => {
                tracing::debug!(lock_key = %key, "Lock released");
                true
            }
            Ok(false) => {
                tracing::debug!(lock_key = %key, "Lock no longer owned at release");
                false
            }
            Err(e) => {
                tracing::warn!(lock_key = %key, error = %e, "Lock release failed");
                false
            }
        }
    }

    /// Whether anyone currently holds `key`. Informational only; the answer
    /// may be stale by the time it is used.
    pub async fn is_locked(&self, key: &str) -> bool {
        let store_key = self.ctx.keys().lock_key(key);
        matches!(self.ctx.store().get(&store_key).await, Ok(Some(_)))
    }
}
