use thiserror::Error;

/// Failures surfaced by a [`KeyValueStore`](crate::store::KeyValueStore) backend.
///
/// Contention outcomes (lock already held, bucket full) are never errors;
/// they come back as ordinary `Ok(false)` results. These variants cover the
/// cases where the store itself could not be used.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not serve the request (connection lost, I/O failure).
    #[error("store backend failure: {0}")]
    Backend(String),

    /// A stored value could not be decoded, or a value could not be encoded
    /// for storage.
    #[error("malformed value at '{key}': {detail}")]
    Encoding { key: String, detail: String },

    /// An atomic script was invoked with mismatched keys/args.
    #[error("atomic script misuse: {0}")]
    Script(String),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Malformed primitive configuration, rejected at construction time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A multi-key mutex needs at least one resource name.
    #[error("mutex group requires at least one name")]
    EmptyGroup,

    /// A leaky bucket with zero capacity can never admit anything.
    #[error("leaky bucket capacity must be greater than zero")]
    ZeroCapacity,

    /// The drain rate must be a positive, finite number of drips per second.
    #[error("leaky bucket drip rate must be positive")]
    NonPositiveDripRate,
}
