use std::time::Duration;

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::{SharedStore, lock_store};
use crate::types::{Script, SetCondition, new_token};

/// Default namespace for exclusive-lock keys, shared with the mutex family.
pub const DEFAULT_LOCK_PREFIX: &str = "mutex:";

/// A single-key, token-guarded advisory lock with TTL auto-expiry.
///
/// The simplest member of the family: one guarded conditional set to
/// acquire, one compare-and-delete to release, no waiting or retry. For
/// bounded-wait acquisition use [`NamedMutex`](crate::mutex::NamedMutex).
pub struct ExclusiveLock {
    store: SharedStore,
    key: String,
    ttl: Duration,
    token: Option<String>,
}

impl ExclusiveLock {
    pub fn new(store: SharedStore, key: &str, ttl: Duration) -> Self {
        Self::with_prefix(store, key, ttl, DEFAULT_LOCK_PREFIX)
    }

    pub fn with_prefix(store: SharedStore, key: &str, ttl: Duration, prefix: &str) -> Self {
        Self {
            store,
            key: format!("{prefix}{key}"),
            ttl,
            token: None,
        }
    }

    /// The store key backing this lock.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Attempt to take the lock: one conditional set of a fresh token with
    /// the configured TTL, guarded by only-if-absent semantics so a live
    /// lock is never silently overwritten. Does not block or retry.
    pub fn acquire(&mut self) -> Result<bool, StoreError> {
        if self.token.is_some() {
            return Ok(true);
        }

        let token = new_token();
        let ttl_ms = self.ttl.as_millis() as u64;
        let written = lock_store(&self.store).set(
            &self.key,
            &token,
            Some(ttl_ms),
            SetCondition::IfAbsent,
        )?;

        if written {
            debug!(key = %self.key, "lock acquired");
            self.token = Some(token);
        }
        Ok(written)
    }

    /// Whether the store's current value at the key still equals our token.
    /// `false` after expiry even if this instance never released.
    pub fn is_locked(&self) -> Result<bool, StoreError> {
        let Some(token) = &self.token else {
            return Ok(false);
        };
        let value = lock_store(&self.store).get(&self.key)?;
        Ok(value.as_deref() == Some(token.as_str()))
    }

    /// Delete the key iff it is still ours; otherwise a no-op. Idempotent,
    /// and invoked automatically when the lock goes out of scope.
    pub fn release(&mut self) -> Result<bool, StoreError> {
        let Some(token) = self.token.take() else {
            return Ok(false);
        };
        let removed = lock_store(&self.store).eval_atomic(
            Script::CompareAndDelete,
            std::slice::from_ref(&self.key),
            &[token],
        )?;
        if removed > 0 {
            debug!(key = %self.key, "lock released");
        }
        Ok(removed > 0)
    }
}

impl Drop for ExclusiveLock {
    fn drop(&mut self) {
        if self.token.is_some() {
            if let Err(e) = self.release() {
                warn!(key = %self.key, error = %e, "auto-release failed");
            }
        }
    }
}
