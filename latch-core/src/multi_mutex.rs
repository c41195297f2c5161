use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ConfigError, StoreError};
use crate::mutex::{MutexSettings, spin_acquire};
use crate::store::{SharedStore, lock_store};
use crate::types::{Script, new_token};

/// A mutex over a fixed group of named resources, acquired and released as
/// one all-or-nothing unit.
///
/// Acquisition runs as a single atomic script: if any key in the group is
/// live the whole attempt fails and nothing is written, so no caller can
/// ever observe a partial acquisition. Each key carries its own independent
/// token — even though acquisition is atomic, a key's TTL can expire on its
/// own and be reclaimed by a different owner, so release still verifies
/// ownership per key.
pub struct MultiKeyMutex {
    store: SharedStore,
    keys: Vec<String>,
    tokens: Option<Vec<String>>,
    settings: MutexSettings,
}

impl MultiKeyMutex {
    pub fn new(store: SharedStore, names: &[&str]) -> Result<Self, ConfigError> {
        Self::with_settings(store, names, MutexSettings::default())
    }

    pub fn with_settings(
        store: SharedStore,
        names: &[&str],
        settings: MutexSettings,
    ) -> Result<Self, ConfigError> {
        if names.is_empty() {
            return Err(ConfigError::EmptyGroup);
        }
        let keys = names
            .iter()
            .map(|name| format!("{}{}", settings.prefix, name))
            .collect();
        Ok(Self {
            store,
            keys,
            tokens: None,
            settings,
        })
    }

    /// The store keys backing this group, in acquisition order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Whether this instance currently believes it holds the group.
    pub fn is_held(&self) -> bool {
        self.tokens.is_some()
    }

    /// One all-or-nothing attempt over the whole group, no waiting.
    pub fn try_acquire(&mut self) -> Result<bool, StoreError> {
        if self.tokens.is_some() {
            return Ok(true);
        }

        let tokens: Vec<String> = self.keys.iter().map(|_| new_token()).collect();
        let ttl_ms = self.settings.auto_expire.as_millis() as u64;

        let mut args = Vec::with_capacity(tokens.len() + 1);
        args.push(ttl_ms.to_string());
        args.extend(tokens.iter().cloned());

        let granted =
            lock_store(&self.store).eval_atomic(Script::AcquireAll, &self.keys, &args)?;

        if granted > 0 {
            debug!(keys = ?self.keys, "mutex group acquired");
            self.tokens = Some(tokens);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Acquire the group with a bounded wait; identical polling and timeout
    /// semantics to [`NamedMutex::acquire`](crate::mutex::NamedMutex::acquire).
    pub fn acquire(&mut self, timeout: Duration) -> Result<bool, StoreError> {
        if timeout.is_zero() {
            return self.try_acquire();
        }
        let tick = self.settings.lock_sleep;
        let label = self.keys.join(",");
        spin_acquire(timeout, tick, &label, || self.try_acquire())
    }

    /// Re-attach to an already-held group by adopting the stored tokens.
    /// Succeeds only when every key in the group is present.
    pub fn resume(&mut self) -> Result<bool, StoreError> {
        let values = lock_store(&self.store).multi_get(&self.keys)?;
        let tokens: Option<Vec<String>> = values.into_iter().collect();
        match tokens {
            Some(tokens) => {
                self.tokens = Some(tokens);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Release every key still carrying its expected token.
    ///
    /// Partial release is tolerated: a key that expired on its own (or was
    /// reclaimed by another owner) is left alone, and the call still reports
    /// success if at least one key was removed.
    pub fn release(&mut self) -> Result<bool, StoreError> {
        let Some(tokens) = self.tokens.take() else {
            return Ok(false);
        };
        let removed =
            lock_store(&self.store).eval_atomic(Script::ReleaseMatching, &self.keys, &tokens)?;
        if removed > 0 {
            debug!(keys = ?self.keys, removed, "mutex group released");
        }
        Ok(removed > 0)
    }
}

impl Drop for MultiKeyMutex {
    fn drop(&mut self) {
        if self.settings.auto_release && self.tokens.is_some() {
            if let Err(e) = self.release() {
                warn!(keys = ?self.keys, error = %e, "auto-release failed");
            }
        }
    }
}
