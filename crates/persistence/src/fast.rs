//! In-process fast cache layer.
//!
//! Purely a latency optimization in front of the durable tables: entries
//! carry their own expiry and are never treated as authoritative on their
//! own. One instance per worker process.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};

struct FastEntry<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

/// TTL-bounded key/value cache guarded by a std RwLock.
pub struct FastCache<T> {
    entries: RwLock<HashMap<String, FastEntry<T>>>,
}

impl<T: Clone> FastCache<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, key: &str, value: T, ttl: Duration) {
        let expires_at =
            Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), FastEntry { value, expires_at });
    }

    /// Fetch a live entry. Expired entries are dropped on access.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = Utc::now();
        {
            let entries = self.entries.read().unwrap();
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Entry exists but has expired; evict it.
        self.entries.write().unwrap().remove(key);
        None
    }

    pub fn remove(&self, key: &str) {
        self.entries.write().unwrap().remove(key);
    }

    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }
}

impl<T: Clone + PartialEq> FastCache<T> {
    /// Drop every entry whose value equals `value` (used when a cache slot
    /// dies and the lookups pointing at it must go with it).
    pub fn remove_by_value(&self, value: &T) {
        self.entries
            .write()
            .unwrap()
            .retain(|_, entry| entry.value != *value);
    }
}

impl<T: Clone> Default for FastCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let cache: FastCache<String> = FastCache::new();
        cache.insert("a", "one".into(), Duration::from_secs(60));
        assert_eq!(cache.get("a"), Some("one".into()));
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn expired_entries_are_absent() {
        let cache: FastCache<u32> = FastCache::new();
        cache.insert("a", 1, Duration::ZERO);
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn purge_drops_only_expired() {
        let cache: FastCache<u32> = FastCache::new();
        cache.insert("dead", 1, Duration::ZERO);
        cache.insert("live", 2, Duration::from_secs(60));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.get("live"), Some(2));
    }

    #[test]
    fn remove_by_value_clears_matching_entries() {
        let cache: FastCache<String> = FastCache::new();
        cache.insert("u1", "key-a".into(), Duration::from_secs(60));
        cache.insert("u2", "key-b".into(), Duration::from_secs(60));
        cache.remove_by_value(&"key-a".to_string());
        assert_eq!(cache.get("u1"), None);
        assert_eq!(cache.get("u2"), Some("key-b".into()));
    }
}
