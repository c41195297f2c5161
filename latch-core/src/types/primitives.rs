use std::time::{SystemTime, UNIX_EPOCH};

use nanoid::nanoid;

/// Generate a fresh ownership token.
///
/// Tokens are random and high-entropy; a live key whose stored value equals
/// an owner's in-memory token certifies that the owner still holds the lock.
pub fn new_token() -> String {
    nanoid!()
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Current wall-clock time in fractional seconds since the Unix epoch.
/// Drip timestamps are recorded at this resolution.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Write condition for [`KeyValueStore::set`](crate::store::KeyValueStore::set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCondition {
    /// Unconditional write.
    Always,
    /// Write only if the key currently has no live value.
    IfAbsent,
}

/// The atomic scripts the coordination core requires from a store.
///
/// Each backend must execute the named script's read/write steps as one
/// indivisible operation relative to every other store client — by Lua
/// script, transaction, or a process-wide mutex, whatever the backend has.
/// A store without any such mechanism cannot implement the contract.
///
/// Calling conventions (keys/args) are documented on
/// [`KeyValueStore::eval_atomic`](crate::store::KeyValueStore::eval_atomic).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Delete one key iff its live value equals the given token.
    /// Returns the number of keys deleted (0 or 1).
    CompareAndDelete,
    /// All-or-nothing group acquisition: if any key is live, touch nothing
    /// and return 0; otherwise set every key to its token with the given TTL
    /// and return 1.
    AcquireAll,
    /// Delete each key whose live value equals its paired token.
    /// Returns the count of keys removed.
    ReleaseMatching,
}
