#[cfg(test)]
mod tests {
    use crate::error::StoreError;
    use crate::mutex::{MutexSettings, NamedMutex};
    use crate::store::{KeyValueStore, SharedStore};
    use crate::store_in_memory::InMemoryStore;
    use crate::types::{Script, SetCondition};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    fn store() -> (Arc<Mutex<InMemoryStore>>, SharedStore) {
        let concrete = Arc::new(Mutex::new(InMemoryStore::new()));
        let shared: SharedStore = concrete.clone();
        (concrete, shared)
    }

    /// Store double that fails its first N writes with a transport error,
    /// then behaves normally. Stands in for a store riding out a brief
    /// backend hiccup.
    struct FlakyStore {
        inner: InMemoryStore,
        set_failures_left: u32,
    }

    impl FlakyStore {
        fn failing_sets(n: u32) -> Self {
            Self {
                inner: InMemoryStore::new(),
                set_failures_left: n,
            }
        }
    }

    impl KeyValueStore for FlakyStore {
        fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }

        fn set(
            &mut self,
            key: &str,
            value: &str,
            ttl_ms: Option<u64>,
            condition: SetCondition,
        ) -> Result<bool, StoreError> {
            if self.set_failures_left > 0 {
                self.set_failures_left -= 1;
                return Err(StoreError::Backend("connection reset".to_string()));
            }
            self.inner.set(key, value, ttl_ms, condition)
        }

        fn delete(&mut self, keys: &[String]) -> Result<u64, StoreError> {
            self.inner.delete(keys)
        }

        fn multi_get(&mut self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
            self.inner.multi_get(keys)
        }

        fn ttl_ms(&mut self, key: &str) -> Result<Option<u64>, StoreError> {
            self.inner.ttl_ms(key)
        }

        fn eval_atomic(
            &mut self,
            script: Script,
            keys: &[String],
            args: &[String],
        ) -> Result<i64, StoreError> {
            self.inner.eval_atomic(script, keys, args)
        }
    }

    fn fast_settings() -> MutexSettings {
        MutexSettings {
            lock_sleep: Duration::from_millis(5),
            ..MutexSettings::default()
        }
    }

    #[test]
    fn test_try_acquire_and_contention() {
        let (_, shared) = store();
        let mut a = NamedMutex::new(shared.clone(), "res");
        let mut b = NamedMutex::new(shared, "res");

        assert!(a.try_acquire().unwrap());
        assert!(a.is_held());
        assert!(!b.try_acquire().unwrap());
        assert!(!b.is_held());

        assert!(a.release().unwrap());
        assert!(b.try_acquire().unwrap());
    }

    #[test]
    fn test_release_is_idempotent() {
        let (_, shared) = store();
        let mut m = NamedMutex::new(shared, "res");

        assert!(!m.release().unwrap()); // never acquired
        assert!(m.try_acquire().unwrap());
        assert!(m.release().unwrap());
        assert!(!m.release().unwrap()); // already released
    }

    #[test]
    fn test_stale_release_leaves_new_owner_intact() {
        let (concrete, shared) = store();
        let mut a = NamedMutex::new(shared.clone(), "res");
        let mut b = NamedMutex::new(shared.clone(), "res");

        assert!(a.try_acquire().unwrap());

        // A's key expires, B re-acquires with a fresh token
        concrete.lock().unwrap().advance(Duration::from_secs(61));
        assert!(b.try_acquire().unwrap());

        // A's release must not remove B's live lock
        assert!(!a.release().unwrap());
        let mut c = NamedMutex::new(shared, "res");
        assert!(!c.try_acquire().unwrap());

        assert!(b.release().unwrap());
    }

    #[test]
    fn test_zero_timeout_is_a_single_attempt() {
        let (_, shared) = store();
        let mut holder = NamedMutex::with_settings(shared.clone(), "res", fast_settings());
        assert!(holder.try_acquire().unwrap());

        let mut waiter = NamedMutex::with_settings(shared, "res", fast_settings());
        let started = Instant::now();
        assert!(!waiter.acquire(Duration::ZERO).unwrap());
        // No polling: back well within one tick of the default settings
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_timeout_bounds_on_held_mutex() {
        let (_, shared) = store();
        let mut holder = NamedMutex::with_settings(shared.clone(), "res", fast_settings());
        assert!(holder.try_acquire().unwrap());

        let mut waiter = NamedMutex::with_settings(shared, "res", fast_settings());
        let timeout = Duration::from_millis(40);
        let started = Instant::now();
        assert!(!waiter.acquire(timeout).unwrap());

        let elapsed = started.elapsed();
        assert!(elapsed >= timeout, "returned early: {elapsed:?}");
        assert!(
            elapsed < timeout + Duration::from_millis(100),
            "returned late: {elapsed:?}"
        );
    }

    #[test]
    fn test_acquire_succeeds_once_freed() {
        let (_, shared) = store();
        let mut holder = NamedMutex::with_settings(shared.clone(), "res", fast_settings());
        assert!(holder.try_acquire().unwrap());
        assert!(holder.release().unwrap());

        let mut waiter = NamedMutex::with_settings(shared, "res", fast_settings());
        assert!(waiter.acquire(Duration::from_millis(100)).unwrap());
    }

    #[test]
    fn test_resume_adopts_stored_token() {
        let (_, shared) = store();
        let mut original = NamedMutex::new(shared.clone(), "res");
        assert!(original.try_acquire().unwrap());

        // A second instance re-attaches without acquiring
        let mut resumed = NamedMutex::new(shared.clone(), "res");
        assert!(resumed.resume().unwrap());
        assert!(resumed.is_held());

        // The resumed instance can release the original's lock
        assert!(resumed.release().unwrap());

        let mut fresh = NamedMutex::new(shared, "other");
        assert!(!fresh.resume().unwrap());
    }

    #[test]
    fn test_drop_auto_releases() {
        let (_, shared) = store();
        {
            let mut held = NamedMutex::new(shared.clone(), "res");
            assert!(held.try_acquire().unwrap());
        }
        let mut next = NamedMutex::new(shared, "res");
        assert!(next.try_acquire().unwrap());
    }

    #[test]
    fn test_drop_without_auto_release_keeps_the_key() {
        let (concrete, shared) = store();
        {
            let settings = MutexSettings {
                auto_release: false,
                ..MutexSettings::default()
            };
            let mut held = NamedMutex::with_settings(shared.clone(), "res", settings);
            assert!(held.try_acquire().unwrap());
        }
        assert!(
            concrete
                .lock()
                .unwrap()
                .get("mutex:res")
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_bounded_wait_rides_out_transient_store_failures() {
        let concrete = Arc::new(Mutex::new(FlakyStore::failing_sets(3)));
        let shared: SharedStore = concrete.clone();
        let mut m = NamedMutex::with_settings(shared, "res", fast_settings());

        // First three attempts hit the transport error; polling continues
        // and the fourth attempt lands
        assert!(m.acquire(Duration::from_millis(200)).unwrap());
        assert!(m.is_held());
        assert!(m.release().unwrap());
    }

    #[test]
    fn test_wait_exhausted_by_failures_reports_not_acquired() {
        let concrete = Arc::new(Mutex::new(FlakyStore::failing_sets(u32::MAX)));
        let shared: SharedStore = concrete.clone();
        let mut m = NamedMutex::with_settings(shared, "res", fast_settings());

        // Every attempt fails inside the window: a definite non-acquisition,
        // not a hang and not an error
        assert!(!m.acquire(Duration::from_millis(30)).unwrap());
        assert!(!m.is_held());
    }

    #[test]
    fn test_zero_timeout_propagates_store_failure() {
        let concrete = Arc::new(Mutex::new(FlakyStore::failing_sets(1)));
        let shared: SharedStore = concrete.clone();
        let mut m = NamedMutex::with_settings(shared, "res", fast_settings());

        // A single-shot attempt has no loop to absorb the failure
        assert!(matches!(
            m.acquire(Duration::ZERO),
            Err(StoreError::Backend(_))
        ));
        assert!(m.try_acquire().unwrap());
    }

    #[test]
    fn test_reentrant_try_acquire_keeps_ownership() {
        let (_, shared) = store();
        let mut m = NamedMutex::new(shared, "res");
        assert!(m.try_acquire().unwrap());
        assert!(m.try_acquire().unwrap());
        assert!(m.release().unwrap());
    }
}
