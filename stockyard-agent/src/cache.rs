//! TTL cache for read-heavy endpoints.
//!
//! A flat map of owner-key strings to timestamped values. Reads outside the
//! TTL miss; writers invalidate their key before any event is published so a
//! subsequent read observes the new state.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One cached value family (state snapshots, inventory listings).
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, V)>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// A fresh value for `key`, or `None` on miss/expiry.
    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.lock().ok()?;
        let (stored_at, value) = entries.get(key)?;
        if stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(value.clone())
    }

    pub fn put(&self, key: &str, value: V) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), (Instant::now(), value));
        }
    }

    pub fn invalidate(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_then_invalidate() {
        let cache = TtlCache::new(Duration::from_secs(30));
        assert!(cache.get("demo:/").is_none());

        cache.put("demo:/", 7u64);
        assert_eq!(cache.get("demo:/"), Some(7));

        cache.invalidate("demo:/");
        assert!(cache.get("demo:/").is_none());
    }

    #[test]
    fn test_expiry() {
        let cache = TtlCache::new(Duration::from_millis(0));
        cache.put("k", 1u64);
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get("k").is_none());
    }
}
