use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

/// Clock source for the cache; injected so tests control time
pub type Clock = fn() -> DateTime<Utc>;

fn system_clock() -> DateTime<Utc> {
    Utc::now()
}

/// Explicit TTL cache owned by the component that needs it.
/// An optimization only, never a source of truth: entries expire on
/// read and the whole cache can be invalidated at any time.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, (DateTime<Utc>, V)>>,
    ttl: Duration,
    clock: Clock,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, system_clock)
    }

    pub fn with_clock(ttl: Duration, clock: Clock) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = (self.clock)();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some((inserted_at, value)) if now - *inserted_at < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        let now = (self.clock)();
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .insert(key, (now, value));
    }

    /// Insert only if no live entry exists. Returns true when the
    /// insert happened, false when a live entry was already present.
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        let now = (self.clock)();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(&key) {
            Some((inserted_at, _)) if now - *inserted_at < self.ttl => false,
            _ => {
                entries.insert(key, (now, value));
                true
            }
        }
    }

    pub fn invalidate(&self, key: &K) {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .remove(key);
    }

    pub fn clear(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }

    /// Drop every expired entry
    pub fn purge_expired(&self) {
        let now = (self.clock)();
        let ttl = self.ttl;
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .retain(|_, (inserted_at, _)| now - *inserted_at < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    static TEST_NOW_SECONDS: AtomicI64 = AtomicI64::new(0);

    fn test_clock() -> DateTime<Utc> {
        DateTime::from_timestamp(TEST_NOW_SECONDS.load(Ordering::SeqCst), 0).unwrap()
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        TEST_NOW_SECONDS.store(1_000, Ordering::SeqCst);
        let cache: TtlCache<&str, u32> = TtlCache::with_clock(Duration::seconds(60), test_clock);

        cache.insert("key", 7);
        assert_eq!(cache.get(&"key"), Some(7));

        TEST_NOW_SECONDS.store(1_059, Ordering::SeqCst);
        assert_eq!(cache.get(&"key"), Some(7));

        TEST_NOW_SECONDS.store(1_060, Ordering::SeqCst);
        assert_eq!(cache.get(&"key"), None);
    }

    #[test]
    fn test_insert_if_absent_guards_live_entries() {
        TEST_NOW_SECONDS.store(2_000, Ordering::SeqCst);
        let cache: TtlCache<&str, ()> = TtlCache::with_clock(Duration::seconds(60), test_clock);

        assert!(cache.insert_if_absent("key", ()));
        assert!(!cache.insert_if_absent("key", ()));

        TEST_NOW_SECONDS.store(2_061, Ordering::SeqCst);
        assert!(cache.insert_if_absent("key", ()));
    }

    #[test]
    fn test_invalidate_and_purge() {
        TEST_NOW_SECONDS.store(3_000, Ordering::SeqCst);
        let cache: TtlCache<u32, u32> = TtlCache::with_clock(Duration::seconds(30), test_clock);

        cache.insert(1, 1);
        cache.insert(2, 2);
        cache.invalidate(&1);
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some(2));

        TEST_NOW_SECONDS.store(3_031, Ordering::SeqCst);
        cache.purge_expired();
        assert!(cache.is_empty());
    }
}
