use std::collections::HashMap;
use std::time::Duration;

use crate::error::StoreError;
use crate::store::KeyValueStore;
use crate::types::{Script, SetCondition, now_ms};

struct Entry {
    value: String,
    expires_at_ms: Option<u64>,
}

/// In-process store backend.
///
/// Expiry is evaluated lazily on access. The clock can be advanced
/// artificially with [`advance`](InMemoryStore::advance), which lets tests
/// exercise TTL expiry without sleeping. Atomicity of `eval_atomic` is
/// trivial here: every operation holds `&mut self`.
pub struct InMemoryStore {
    entries: HashMap<String, Entry>,
    clock_offset: Duration,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            clock_offset: Duration::ZERO,
        }
    }

    /// Shift this store's notion of "now" forward.
    pub fn advance(&mut self, by: Duration) {
        self.clock_offset += by;
    }

    fn now(&self) -> u64 {
        now_ms() + self.clock_offset.as_millis() as u64
    }

    /// Drop the entry at `key` if its TTL has elapsed.
    fn expire(&mut self, key: &str) {
        let now = self.now();
        let expired = self
            .entries
            .get(key)
            .is_some_and(|e| matches!(e.expires_at_ms, Some(at) if at <= now));
        if expired {
            self.entries.remove(key);
        }
    }

    fn live_value(&mut self, key: &str) -> Option<&str> {
        self.expire(key);
        self.entries.get(key).map(|e| e.value.as_str())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.live_value(key).map(str::to_string))
    }

    fn set(
        &mut self,
        key: &str,
        value: &str,
        ttl_ms: Option<u64>,
        condition: SetCondition,
    ) -> Result<bool, StoreError> {
        self.expire(key);

        if condition == SetCondition::IfAbsent && self.entries.contains_key(key) {
            return Ok(false);
        }

        let expires_at_ms = ttl_ms.map(|ttl| self.now() + ttl);
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at_ms,
            },
        );
        Ok(true)
    }

    fn delete(&mut self, keys: &[String]) -> Result<u64, StoreError> {
        let mut removed = 0;
        for key in keys {
            self.expire(key);
            if self.entries.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn multi_get(&mut self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        Ok(keys
            .iter()
            .map(|key| self.live_value(key).map(str::to_string))
            .collect())
    }

    fn ttl_ms(&mut self, key: &str) -> Result<Option<u64>, StoreError> {
        self.expire(key);
        let now = self.now();
        Ok(self
            .entries
            .get(key)
            .and_then(|e| e.expires_at_ms)
            .map(|at| at.saturating_sub(now)))
    }

    fn eval_atomic(
        &mut self,
        script: Script,
        keys: &[String],
        args: &[String],
    ) -> Result<i64, StoreError> {
        match script {
            Script::CompareAndDelete => {
                if keys.len() != 1 || args.len() != 1 {
                    return Err(StoreError::Script(
                        "compare-and-delete takes one key and one token".into(),
                    ));
                }
                if self.live_value(&keys[0]) == Some(args[0].as_str()) {
                    self.entries.remove(&keys[0]);
                    Ok(1)
                } else {
                    Ok(0)
                }
            }
            Script::AcquireAll => {
                if args.len() != keys.len() + 1 {
                    return Err(StoreError::Script(
                        "acquire-all takes a ttl followed by one token per key".into(),
                    ));
                }
                let ttl_ms: u64 = args[0]
                    .parse()
                    .map_err(|_| StoreError::Script(format!("bad ttl '{}'", args[0])))?;

                for key in keys {
                    if self.live_value(key).is_some() {
                        return Ok(0);
                    }
                }
                let expires_at_ms = Some(self.now() + ttl_ms);
                for (key, token) in keys.iter().zip(&args[1..]) {
                    self.entries.insert(
                        key.clone(),
                        Entry {
                            value: token.clone(),
                            expires_at_ms,
                        },
                    );
                }
                Ok(1)
            }
            Script::ReleaseMatching => {
                if args.len() != keys.len() {
                    return Err(StoreError::Script(
                        "release-matching takes one token per key".into(),
                    ));
                }
                let mut removed = 0;
                for (key, token) in keys.iter().zip(args) {
                    if self.live_value(key) == Some(token.as_str()) {
                        self.entries.remove(key);
                        removed += 1;
                    }
                }
                Ok(removed)
            }
        }
    }
}
