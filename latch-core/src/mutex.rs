use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::{SharedStore, lock_store};
use crate::types::{Script, SetCondition, new_token};

/// Tuning knobs shared by the mutex family.
#[derive(Debug, Clone)]
pub struct MutexSettings {
    /// Namespace prepended to resource names to form store keys.
    pub prefix: String,
    /// Store-enforced TTL on held keys; a crashed holder frees the mutex
    /// after this long.
    pub auto_expire: Duration,
    /// Poll tick inside `acquire(timeout)`.
    pub lock_sleep: Duration,
    /// Release a still-held mutex when it goes out of scope.
    pub auto_release: bool,
}

impl Default for MutexSettings {
    fn default() -> Self {
        Self {
            prefix: "mutex:".to_string(),
            auto_expire: Duration::from_secs(60),
            lock_sleep: Duration::from_millis(100),
            auto_release: true,
        }
    }
}

/// A named advisory mutex held through the shared store.
///
/// Ownership is certified by a random token: the mutex is held by whoever
/// wrote the token currently stored at the key. The store is the single
/// source of truth — release re-verifies the token against the store
/// atomically, so a release can never remove a lock that expired and was
/// re-acquired by someone else.
pub struct NamedMutex {
    store: SharedStore,
    key: String,
    token: Option<String>,
    settings: MutexSettings,
}

impl NamedMutex {
    pub fn new(store: SharedStore, name: &str) -> Self {
        Self::with_settings(store, name, MutexSettings::default())
    }

    pub fn with_settings(store: SharedStore, name: &str, settings: MutexSettings) -> Self {
        Self {
            store,
            key: format!("{}{}", settings.prefix, name),
            token: None,
            settings,
        }
    }

    /// The store key backing this mutex.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether this instance currently believes it holds the mutex.
    /// The store remains authoritative; the key may have expired.
    pub fn is_held(&self) -> bool {
        self.token.is_some()
    }

    /// One conditional-set attempt, no waiting.
    ///
    /// Returns `Ok(true)` and remembers the fresh token on success;
    /// `Ok(false)` when the key is already live. Re-entry while already
    /// held short-circuits to `Ok(true)` without touching the store.
    pub fn try_acquire(&mut self) -> Result<bool, StoreError> {
        if self.token.is_some() {
            return Ok(true);
        }

        let token = new_token();
        let ttl_ms = self.settings.auto_expire.as_millis() as u64;
        let written = lock_store(&self.store).set(
            &self.key,
            &token,
            Some(ttl_ms),
            SetCondition::IfAbsent,
        )?;

        if written {
            debug!(key = %self.key, "mutex acquired");
            self.token = Some(token);
        }
        Ok(written)
    }

    /// Acquire with a bounded wait.
    ///
    /// A zero timeout performs exactly one [`try_acquire`](Self::try_acquire).
    /// Otherwise polls on the `lock_sleep` tick until acquisition succeeds or
    /// the timeout elapses; failure arrives no earlier than the timeout and
    /// no later than one tick past it. A transient store failure during one
    /// attempt counts as a failed attempt and polling continues.
    pub fn acquire(&mut self, timeout: Duration) -> Result<bool, StoreError> {
        if timeout.is_zero() {
            return self.try_acquire();
        }
        let tick = self.settings.lock_sleep;
        let label = self.key.clone();
        spin_acquire(timeout, tick, &label, || self.try_acquire())
    }

    /// Re-attach to an already-held mutex by adopting the token currently
    /// stored at the key. Returns whether a value was present.
    pub fn resume(&mut self) -> Result<bool, StoreError> {
        match lock_store(&self.store).get(&self.key)? {
            Some(value) => {
                self.token = Some(value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Release the mutex iff the store still carries our token.
    ///
    /// Returns whether a key was actually deleted. Releasing a mutex that
    /// was never acquired, already released, or expired-and-reclaimed is a
    /// no-op reported as `Ok(false)`.
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
            debug!(key = %self.key, "mutex released");
        }
        Ok(removed > 0)
    }
}

impl Drop for NamedMutex {
    fn drop(&mut self) {
        if self.settings.auto_release && self.token.is_some() {
            if let Err(e) = self.release() {
                warn!(key = %self.key, error = %e, "auto-release failed");
            }
        }
    }
}

/// Shared poll loop for the mutex family: cooperative spin-waiting on a
/// fixed tick, not OS-level blocking on the store.
pub(crate) fn spin_acquire(
    timeout: Duration,
    tick: Duration,
    key: &str,
    mut attempt: impl FnMut() -> Result<bool, StoreError>,
) -> Result<bool, StoreError> {
    let deadline = Instant::now() + timeout;
    loop {
        match attempt() {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(e) => {
                warn!(key = %key, error = %e, "acquire attempt failed; retrying");
            }
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        thread::sleep(tick);
    }
}
