//! High-level ergonomic client that wraps the coordination primitives around
//! one shared store handle. Callers that only need a single primitive can
//! construct it directly; the client exists so an application can hold one
//! store connection and one set of tuning knobs.

use std::time::Duration;

use crate::bucket::{DEFAULT_DRIP_PREFIX, LeakyBucket};
use crate::error::ConfigError;
#[cfg(feature = "sqlite")]
use crate::error::StoreError;
use crate::lock::ExclusiveLock;
use crate::multi_mutex::MultiKeyMutex;
use crate::mutex::{MutexSettings, NamedMutex};
use crate::store::{SharedStore, shared};
use crate::store_in_memory::InMemoryStore;
use crate::types::BucketConfig;

/// Store-wide configuration applied to every primitive the client vends.
#[derive(Debug, Clone)]
pub struct LatchConfig {
    /// Namespace for lock and mutex keys.
    pub mutex_prefix: String,
    /// Namespace for bucket keys.
    pub drip_prefix: String,
    /// Poll tick used by bounded-wait acquisition.
    pub lock_sleep: Duration,
    /// TTL written on held mutex keys.
    pub auto_expire: Duration,
    /// Release still-held mutexes when they go out of scope.
    pub auto_release: bool,
}

impl Default for LatchConfig {
    fn default() -> Self {
        Self {
            mutex_prefix: "mutex:".to_string(),
            drip_prefix: DEFAULT_DRIP_PREFIX.to_string(),
            lock_sleep: Duration::from_millis(100),
            auto_expire: Duration::from_secs(60),
            auto_release: true,
        }
    }
}

impl LatchConfig {
    fn mutex_settings(&self) -> MutexSettings {
        MutexSettings {
            prefix: self.mutex_prefix.clone(),
            auto_expire: self.auto_expire,
            lock_sleep: self.lock_sleep,
            auto_release: self.auto_release,
        }
    }
}

/// The main entry point for using latch. Owns a shared store handle and
/// hands out primitives configured consistently against it.
pub struct LatchClient {
    store: SharedStore,
    config: LatchConfig,
}

impl LatchClient {
    /// Create a client over a fresh in-memory store.
    pub fn new() -> Self {
        Self::with_store(shared(InMemoryStore::new()))
    }

    /// Create a client over an existing store handle with default settings.
    pub fn with_store(store: SharedStore) -> Self {
        Self::with_config(store, LatchConfig::default())
    }

    pub fn with_config(store: SharedStore, config: LatchConfig) -> Self {
        Self { store, config }
    }

    /// Create a client backed by SQLite at the given path. Locks and bucket
    /// state persist across process restarts.
    #[cfg(feature = "sqlite")]
    pub fn with_sqlite(path: &str) -> Result<Self, StoreError> {
        let store = crate::store_sqlite::SqliteStore::open(path)?;
        Ok(Self::with_store(shared(store)))
    }

    /// The underlying store handle, for sharing with primitives built
    /// outside this client.
    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    /// A named mutex over one resource.
    pub fn mutex(&self, name: &str) -> NamedMutex {
        NamedMutex::with_settings(self.store.clone(), name, self.config.mutex_settings())
    }

    /// An all-or-nothing mutex over a group of resources.
    pub fn multi_mutex(&self, names: &[&str]) -> Result<MultiKeyMutex, ConfigError> {
        MultiKeyMutex::with_settings(self.store.clone(), names, self.config.mutex_settings())
    }

    /// A single-key exclusive lock with the given TTL.
    pub fn lock(&self, key: &str, ttl: Duration) -> ExclusiveLock {
        ExclusiveLock::with_prefix(self.store.clone(), key, ttl, &self.config.mutex_prefix)
    }

    /// A leaky bucket at the given name.
    pub fn bucket(&self, name: &str, config: BucketConfig) -> Result<LeakyBucket, ConfigError> {
        LeakyBucket::with_prefix(self.store.clone(), name, config, &self.config.drip_prefix)
    }
}

impl Default for LatchClient {
    fn default() -> Self {
        Self::new()
    }
}
