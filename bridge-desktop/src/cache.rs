//! TTL response cache used by the network adapters.
//!
//! Entries expire lazily: freshness is checked on read and a stale entry is
//! evicted by the read that finds it. Nothing sweeps in the background.

use bridge_traits::time::Clock;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One cached value. `cached_at` is epoch milliseconds, `ttl` milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<V> {
    pub data: V,
    pub cached_at: i64,
    pub ttl: u64,
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl<V> CacheEntry<V> {
    /// Fresh iff `now - cached_at <= effective ttl`, where the effective ttl
    /// is `max_age` when given and the stored ttl otherwise.
    pub fn is_fresh(&self, now_ms: i64, max_age: Option<Duration>) -> bool {
        let effective = max_age.map(saturating_millis).unwrap_or(self.ttl);
        let age = now_ms.saturating_sub(self.cached_at);
        age <= i64::try_from(effective).unwrap_or(i64::MAX)
    }
}

/// Cache keyed by resolved URL. Clones share entries.
#[derive(Clone)]
pub struct TtlCache<V> {
    entries: Arc<Mutex<HashMap<String, CacheEntry<V>>>>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(clock: Arc<dyn Clock>, default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock,
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Fresh value for `key`. A stale entry is removed.
    pub fn get(&self, key: &str, max_age: Option<Duration>) -> Option<V> {
        let now = self.clock.unix_timestamp_millis();
        let mut entries = self.entries.lock();

        let fresh = entries.get(key)?.is_fresh(now, max_age);
        if fresh {
            debug!(key = key, "Cache HIT");
            entries.get(key).map(|entry| entry.data.clone())
        } else {
            debug!(key = key, "Cache EXPIRED");
            entries.remove(key);
            None
        }
    }

    /// Store `data` under `key`, stamped now. `ttl` defaults to the cache's
    /// default TTL.
    pub fn set(&self, key: impl Into<String>, data: V, ttl: Option<Duration>) {
        let key = key.into();
        let entry = CacheEntry {
            data,
            cached_at: self.clock.unix_timestamp_millis(),
            ttl: saturating_millis(ttl.unwrap_or(self.default_ttl)),
        };
        debug!(key = %key, ttl_ms = entry.ttl, "Cache PUT");
        self.entries.lock().insert(key, entry);
    }

    /// Inspect an entry without freshness checks or eviction.
    pub fn peek(&self, key: &str) -> Option<CacheEntry<V>> {
        self.entries.lock().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries.lock().remove(key).map(|entry| entry.data)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::time::{ManualClock, SystemClock};
    use serde_json::json;

    fn cache(clock: &ManualClock) -> TtlCache<i32> {
        TtlCache::new(Arc::new(clock.clone()), Duration::from_secs(300))
    }

    #[test]
    fn test_fresh_then_stale_with_eviction() {
        let clock = ManualClock::at_millis(10_000);
        let cache = cache(&clock);

        cache.set("/x", 42, Some(Duration::from_millis(50)));
        assert_eq!(cache.get("/x", None), Some(42));

        clock.advance(Duration::from_millis(50));
        assert_eq!(cache.get("/x", None), Some(42), "boundary is inclusive");

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get("/x", None), None);
        assert!(cache.peek("/x").is_none(), "stale entry evicted on read");
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let clock = ManualClock::at_millis(1_000);
        let cache = cache(&clock);
        cache.set("/forever", 7, Some(Duration::MAX));
        assert_eq!(cache.peek("/forever").unwrap().ttl, u64::MAX);

        clock.advance(Duration::from_secs(10 * 365 * 24 * 3600));
        assert_eq!(cache.get("/forever", None), Some(7));
        assert_eq!(cache.get("/forever", Some(Duration::MAX)), Some(7));
    }

    #[test]
    fn test_read_time_override() {
        let clock = ManualClock::at_millis(0);
        let cache = cache(&clock);
        cache.set("/books", 1, None);

        clock.advance(Duration::from_secs(10));
        assert_eq!(cache.get("/books", Some(Duration::from_secs(60))), Some(1));
        assert_eq!(cache.get("/books", Some(Duration::from_secs(5))), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_default_ttl_applies() {
        let clock = ManualClock::at_millis(0);
        let cache = cache(&clock);
        cache.set("/a", 7, None);
        let entry = cache.peek("/a").unwrap();
        assert_eq!(entry.ttl, 300_000);
        assert_eq!(entry.cached_at, 0);
    }

    #[test]
    fn test_peek_does_not_evict() {
        let clock = ManualClock::at_millis(0);
        let cache = cache(&clock);
        cache.set("/a", 7, Some(Duration::from_millis(1)));
        clock.advance(Duration::from_secs(1));
        assert!(cache.peek("/a").is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_entry_wire_shape() {
        let entry = CacheEntry {
            data: json!({"book": "GEN"}),
            cached_at: 1_700_000_000_000,
            ttl: 50,
        };
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"data": {"book": "GEN"}, "cachedAt": 1_700_000_000_000i64, "ttl": 50})
        );
    }

    #[tokio::test]
    async fn test_expiry_with_system_clock() {
        let cache: TtlCache<i32> = TtlCache::new(Arc::new(SystemClock), Duration::from_secs(1));
        cache.set("/x", 42, Some(Duration::from_millis(50)));
        assert_eq!(cache.get("/x", None), Some(42));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get("/x", None), None);
        assert!(cache.peek("/x").is_none());
    }
}
