//! # latch-core
//!
//! Coordination primitives built on a shared key-value store.
//! Provides token-guarded exclusive locks, bounded-wait named mutexes,
//! all-or-nothing multi-key mutexes, and leaky-bucket rate limiting.

pub mod bucket;
pub mod client;
pub mod error;
pub mod lock;
pub mod multi_mutex;
pub mod mutex;
pub mod store;
#[path = "store_in_memory.rs"]
pub mod store_in_memory;
#[cfg(feature = "sqlite")]
#[path = "store_sqlite.rs"]
pub mod store_sqlite;
pub mod types;

#[cfg(test)]
#[path = "mutex_test.rs"]
mod mutex_test;
