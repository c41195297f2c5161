use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How much a single [`drip`](crate::bucket::LeakyBucket::drip) consumes:
/// either a literal drip count or a name resolved through the bucket's
/// cost table (unknown names cost 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DripSize {
    Count(u64),
    Named(String),
}

impl From<u64> for DripSize {
    fn from(n: u64) -> Self {
        DripSize::Count(n)
    }
}

impl From<&str> for DripSize {
    fn from(name: &str) -> Self {
        DripSize::Named(name.to_string())
    }
}

impl From<String> for DripSize {
    fn from(name: String) -> Self {
        DripSize::Named(name)
    }
}

/// Leaky bucket parameters.
#[derive(Debug, Clone)]
pub struct BucketConfig {
    /// Maximum number of drips the bucket holds.
    pub capacity: u64,
    /// Drips leaked per second.
    pub drip_rate: f64,
    /// Named drip sizes, e.g. "get" -> 1, "post" -> 5.
    pub costs: HashMap<String, u64>,
}

impl BucketConfig {
    pub fn new(capacity: u64, drip_rate: f64) -> Self {
        Self {
            capacity,
            drip_rate,
            costs: HashMap::new(),
        }
    }

    /// Register a named drip size.
    pub fn with_cost(mut self, name: impl Into<String>, drips: u64) -> Self {
        self.costs.insert(name.into(), drips);
        self
    }
}

/// Point-in-time bucket snapshot, shaped for exposure as response headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketStatus {
    /// Fill level as "level/capacity", e.g. "5/5".
    pub level: String,
    /// Drain rate formatted to two decimals, e.g. "1.00".
    pub drip_rate: String,
    /// Milliseconds until the oldest drip ages out; 0 when not full.
    pub wait_ms: u64,
}
