use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::StoreError;
use crate::types::{Script, SetCondition};

/// Defines the contract for key-value store backends.
///
/// The coordination primitives depend only on this trait; concrete backends
/// (in-memory, SQLite, a networked store) live behind it. Expiry is
/// millisecond-resolution and store-enforced: an expired key behaves exactly
/// like an absent one.
pub trait KeyValueStore {
    /// Read the live value at `key`.
    fn get(&mut self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` at `key`, optionally with a TTL in milliseconds.
    /// Returns whether the write happened (an `IfAbsent` write against a
    /// live key returns `Ok(false)` and leaves the key untouched).
    fn set(
        &mut self,
        key: &str,
        value: &str,
        ttl_ms: Option<u64>,
        condition: SetCondition,
    ) -> Result<bool, StoreError>;

    /// Delete the given keys, returning how many were live and removed.
    fn delete(&mut self, keys: &[String]) -> Result<u64, StoreError>;

    /// Read several keys at once; the result is aligned with `keys`.
    fn multi_get(&mut self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError>;

    /// Remaining lifetime of `key` in milliseconds. `None` when the key is
    /// absent or has no expiry.
    fn ttl_ms(&mut self, key: &str) -> Result<Option<u64>, StoreError>;

    /// Execute one of the named atomic scripts as a single indivisible
    /// operation relative to all other store clients.
    ///
    /// Calling conventions:
    /// - [`Script::CompareAndDelete`]: keys = `[key]`, args = `[token]`;
    ///   returns the deleted count (0 or 1).
    /// - [`Script::AcquireAll`]: keys = the group's keys, args =
    ///   `[ttl_ms, token_0, .., token_n-1]` aligned with keys; returns 1 if
    ///   no key was live and every key was set, 0 if any key was live
    ///   (in which case nothing is touched).
    /// - [`Script::ReleaseMatching`]: keys = the group's keys, args = the
    ///   aligned tokens; returns the count of keys whose live value matched
    ///   and were deleted.
    fn eval_atomic(
        &mut self,
        script: Script,
        keys: &[String],
        args: &[String],
    ) -> Result<i64, StoreError>;
}

/// Shared handle to a store backend.
///
/// Primitives clone this handle so that release-on-drop still has a path to
/// the store after the owning scope unwinds.
pub type SharedStore = Arc<Mutex<dyn KeyValueStore + Send>>;

/// Wrap a concrete backend into a [`SharedStore`] handle.
pub fn shared<S: KeyValueStore + Send + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Lock the shared handle. A poisoned mutex only means another holder
/// panicked mid-operation; the store itself is still usable.
pub(crate) fn lock_store(
    store: &SharedStore,
) -> MutexGuard<'_, dyn KeyValueStore + Send + 'static> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}
