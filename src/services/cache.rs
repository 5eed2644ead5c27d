use dashmap::DashMap;
use std::time::{Duration, Instant};

/// A thread-safe, bounded cache with TTL support.
///
/// Expired entries are not dropped on read: `get` hides them, while
/// `get_stale` still returns them so callers can serve a last-known-good
/// value when a refresh fails.
pub struct Cache<V> {
    data: DashMap<String, CacheEntry<V>>,
    default_ttl: Duration,
    max_entries: usize,
}

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    expires_at: Instant,
}

/// A cached value along with whether it is still within its TTL.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<V> {
    pub value: V,
    pub fresh: bool,
    pub age: Duration,
}

impl<V: Clone> Cache<V> {
    /// Create a new cache with the given default TTL and capacity.
    pub fn new(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            data: DashMap::new(),
            default_ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Get a value if it has not expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.data.get(key)?;
        if entry.expires_at > Instant::now() {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Get a value regardless of expiry.
    pub fn get_stale(&self, key: &str) -> Option<Cached<V>> {
        let entry = self.data.get(key)?;
        let now = Instant::now();
        Some(Cached {
            value: entry.value.clone(),
            fresh: entry.expires_at > now,
            age: now.saturating_duration_since(entry.inserted_at),
        })
    }

    /// Set a value in the cache with the default TTL.
    pub fn set(&self, key: String, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Set a value in the cache with a custom TTL.
    pub fn set_with_ttl(&self, key: String, value: V, ttl: Duration) {
        if !self.data.contains_key(&key) && self.data.len() >= self.max_entries {
            self.evict_oldest();
        }
        let now = Instant::now();
        self.data.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                expires_at: now + ttl,
            },
        );
    }

    /// Check if a key exists and is not expired.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove a value from the cache.
    pub fn remove(&self, key: &str) -> Option<V> {
        self.data.remove(key).map(|(_, entry)| entry.value)
    }

    /// Clear all entries from the cache.
    pub fn clear(&self) {
        self.data.clear();
    }

    /// Number of entries, including expired ones.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn evict_oldest(&self) {
        let oldest = self
            .data
            .iter()
            .min_by_key(|entry| entry.value().inserted_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.data.remove(&key);
        }
    }
}
