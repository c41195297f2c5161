use std::collections::HashMap;

use tracing::debug;

use crate::error::{ConfigError, StoreError};
use crate::store::{SharedStore, lock_store};
use crate::types::{BucketConfig, BucketStatus, DripSize, SetCondition, now_secs};

/// Default namespace for bucket keys.
pub const DEFAULT_DRIP_PREFIX: &str = "drip:";

/// Admission control via a leaky bucket.
///
/// Each admitted unit of work records one or more "drips" — wall-clock
/// timestamps stored together at a single key. Drips older than the drain
/// window (`capacity / drip_rate` seconds) are forgotten; new work is
/// rejected once the bucket is full. No locking is involved.
///
/// The load-mutate-save cycle is **not** atomic against the store:
/// concurrent drips on the same key can lose updates. This is an accepted,
/// documented best-effort limitation; callers needing a hard guarantee must
/// serialize access themselves (e.g. under a [`NamedMutex`](crate::mutex::NamedMutex)).
///
/// Every time-sensitive operation has a `*_at(now)` form taking the current
/// time as fractional Unix seconds; the plain forms read the wall clock.
pub struct LeakyBucket {
    store: SharedStore,
    key: String,
    capacity: u64,
    drip_rate: f64,
    costs: HashMap<String, u64>,
    drips: Vec<f64>,
}

impl LeakyBucket {
    pub fn new(store: SharedStore, name: &str, config: BucketConfig) -> Result<Self, ConfigError> {
        Self::with_prefix(store, name, config, DEFAULT_DRIP_PREFIX)
    }

    pub fn with_prefix(
        store: SharedStore,
        name: &str,
        config: BucketConfig,
        prefix: &str,
    ) -> Result<Self, ConfigError> {
        if config.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if !(config.drip_rate > 0.0) || !config.drip_rate.is_finite() {
            return Err(ConfigError::NonPositiveDripRate);
        }
        Ok(Self {
            store,
            key: format!("{prefix}{name}"),
            capacity: config.capacity,
            drip_rate: config.drip_rate,
            costs: config.costs,
            drips: Vec::new(),
        })
    }

    /// The store key backing this bucket.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Seconds for a full bucket to drain completely with no new drips.
    pub fn period(&self) -> f64 {
        self.capacity as f64 / self.drip_rate
    }

    /// Number of drips retained as of the most recent purge.
    pub fn level(&self) -> u64 {
        self.drips.len() as u64
    }

    /// Whether the bucket has reached capacity.
    pub fn is_full(&self) -> bool {
        self.level() >= self.capacity
    }

    /// Reload the drip collection from the store and purge drips that have
    /// aged out of the drain window.
    pub fn refresh(&mut self) -> Result<(), StoreError> {
        self.refresh_at(now_secs())
    }

    pub fn refresh_at(&mut self, now: f64) -> Result<(), StoreError> {
        let raw = lock_store(&self.store).get(&self.key)?;
        let mut drips: Vec<f64> = match raw {
            Some(json) => serde_json::from_str(&json).map_err(|e| StoreError::Encoding {
                key: self.key.clone(),
                detail: e.to_string(),
            })?,
            None => Vec::new(),
        };
        // Strictly newer than the horizon: a drip exactly `period` old has
        // fully drained, which keeps wait_ms and is_full consistent at the
        // drain instant.
        let horizon = now - self.period();
        drips.retain(|&t| t > horizon);
        self.drips = drips;
        Ok(())
    }

    /// Add `size` drips (a literal count, or a name resolved through the
    /// cost table — unknown names cost 1).
    ///
    /// Rejects with `Ok(false)` and no store write when the bucket is
    /// already full or when `size` would push the level strictly over
    /// capacity; an oversized request never partially drips. On admission
    /// the whole collection is persisted back in one write.
    pub fn drip(&mut self, size: impl Into<DripSize>) -> Result<bool, StoreError> {
        self.drip_at(size, now_secs())
    }

    pub fn drip_at(&mut self, size: impl Into<DripSize>, now: f64) -> Result<bool, StoreError> {
        let count = self.resolve(size.into());
        self.refresh_at(now)?;

        // Headroom comparison rather than level + count, which could overflow
        if self.is_full() || count > self.capacity - self.level() {
            debug!(key = %self.key, level = self.level(), count, "drip rejected");
            return Ok(false);
        }

        for _ in 0..count {
            self.drips.push(now);
        }
        self.save()?;
        Ok(true)
    }

    /// Milliseconds until the oldest drip ages out and frees one slot;
    /// 0 when the bucket is not full.
    pub fn wait_ms(&self) -> u64 {
        self.wait_ms_at(now_secs())
    }

    pub fn wait_ms_at(&self, now: f64) -> u64 {
        if !self.is_full() {
            return 0;
        }
        let oldest = self.drips.iter().copied().fold(f64::INFINITY, f64::min);
        let remaining = self.period() - (now - oldest);
        (remaining.max(0.0) * 1000.0).ceil() as u64
    }

    /// Structured snapshot for exposure as response headers.
    pub fn status(&self) -> BucketStatus {
        self.status_at(now_secs())
    }

    pub fn status_at(&self, now: f64) -> BucketStatus {
        BucketStatus {
            level: format!("{}/{}", self.level(), self.capacity),
            drip_rate: format!("{:.2}", self.drip_rate),
            wait_ms: self.wait_ms_at(now),
        }
    }

    fn resolve(&self, size: DripSize) -> u64 {
        match size {
            DripSize::Count(n) => n,
            DripSize::Named(name) => self.costs.get(&name).copied().unwrap_or(1),
        }
    }

    fn save(&mut self) -> Result<(), StoreError> {
        let json = serde_json::to_string(&self.drips).map_err(|e| StoreError::Encoding {
            key: self.key.clone(),
            detail: e.to_string(),
        })?;
        lock_store(&self.store).set(&self.key, &json, None, SetCondition::Always)?;
        Ok(())
    }
}
