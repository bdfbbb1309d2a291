//! Bounded in-memory cache with least-recently-used eviction and optional per-entry TTL.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::{Duration, Instant};

/// A cached value with its recency tick and expiry
#[derive(Debug, Clone)]
struct Slot<V> {
    value: V,
    tick: u64,
    inserted_at: Instant,
    expires_at: Option<Instant>,
}

impl<V> Slot<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// LRU cache keyed by `K`.
///
/// Every read or write moves the entry to the most recent position. Inserting past
/// `capacity` evicts the least recently used entry. Expired entries are dropped on
/// access.
#[derive(Debug)]
pub struct LruCache<K, V> {
    storage: HashMap<K, Slot<V>>,
    recency: BTreeMap<u64, K>,
    next_tick: u64,
    capacity: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    /// Creates a cache holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: HashMap::new(),
            recency: BTreeMap::new(),
            next_tick: 0,
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    fn bump(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    /// Gets a live entry and marks it most recently used
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let now = Instant::now();
        let expired = match self.storage.get(key) {
            None => {
                self.misses += 1;
                return None;
            }
            Some(slot) => slot.is_expired(now),
        };

        if expired {
            self.remove(key);
            self.misses += 1;
            return None;
        }

        let tick = self.bump();
        let slot = self.storage.get_mut(key)?;
        self.recency.remove(&slot.tick);
        slot.tick = tick;
        self.recency.insert(tick, key.clone());
        self.hits += 1;
        Some(&slot.value)
    }

    /// Returns whether `key` holds an unexpired entry, without touching recency
    pub fn contains(&self, key: &K) -> bool {
        self.storage
            .get(key)
            .is_some_and(|slot| !slot.is_expired(Instant::now()))
    }

    /// Stores a value, replacing any previous entry for the key
    ///
    /// A `ttl` too large to represent as a deadline never expires.
    pub fn insert(&mut self, key: K, value: V, ttl: Option<Duration>) {
        let now = Instant::now();
        self.remove(&key);

        while self.storage.len() >= self.capacity {
            if !self.evict_oldest() {
                break;
            }
        }

        let tick = self.bump();
        self.recency.insert(tick, key.clone());
        self.storage.insert(
            key,
            Slot {
                value,
                tick,
                inserted_at: now,
                expires_at: ttl.and_then(|ttl| now.checked_add(ttl)),
            },
        );
    }

    /// Removes a specific entry, returning its value
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.storage.remove(key)?;
        self.recency.remove(&slot.tick);
        Some(slot.value)
    }

    /// Evicts the least recently used entry
    fn evict_oldest(&mut self) -> bool {
        let Some((_, key)) = self.recency.pop_first() else {
            return false;
        };
        self.storage.remove(&key);
        self.evictions += 1;
        true
    }

    /// Drops every expired entry
    pub fn clear_expired(&mut self) {
        let now = Instant::now();
        let expired: Vec<K> = self
            .storage
            .iter()
            .filter(|(_, slot)| slot.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            self.remove(&key);
        }
    }

    /// Clears all entries from the cache
    pub fn clear(&mut self) {
        self.storage.clear();
        self.recency.clear();
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Age of the oldest live entry.
    pub fn oldest_age(&self) -> Option<Duration> {
        self.storage
            .values()
            .map(|slot| slot.inserted_at.elapsed())
            .max()
    }

    /// Returns cache statistics
    pub fn stats(&self) -> CacheStats {
        let lookups = self.hits + self.misses;
        CacheStats {
            entries: self.len(),
            capacity: self.capacity,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                self.hits as f64 / lookups as f64
            },
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of entries in the cache
    pub entries: usize,
    /// Maximum number of entries
    pub capacity: usize,
    /// Lookups that found a live entry
    pub hits: u64,
    /// Lookups that found nothing or an expired entry
    pub misses: u64,
    /// Entries dropped to make room
    pub evictions: u64,
    /// Hits over total lookups, 0 when nothing was looked up
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_insert_and_get() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1, None);
        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.get(&"b"), None);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1, None);
        cache.insert("b", 2, None);
        // Touch "a" so "b" becomes the eviction candidate
        assert!(cache.get(&"a").is_some());
        cache.insert("c", 3, None);

        assert!(cache.contains(&"a"));
        assert!(!cache.contains(&"b"));
        assert!(cache.contains(&"c"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_replacing_does_not_evict() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1, None);
        cache.insert("b", 2, None);
        cache.insert("a", 10, None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(&10));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_expired_entries_miss() {
        let mut cache = LruCache::new(4);
        cache.insert("short", 1, Some(Duration::from_millis(10)));
        cache.insert("long", 2, Some(Duration::from_secs(60)));
        thread::sleep(Duration::from_millis(30));

        assert_eq!(cache.get(&"short"), None);
        assert_eq!(cache.get(&"long"), Some(&2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_expired_and_clear() {
        let mut cache = LruCache::new(4);
        cache.insert(1, "x", Some(Duration::ZERO));
        cache.insert(2, "y", None);
        cache.clear_expired();
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.remove(&2).is_none());
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        let mut cache = LruCache::new(2);
        cache.insert("forever", 1, Some(Duration::MAX));
        cache.insert("hours", 2, Some(Duration::from_secs(u64::MAX / 2)));
        assert_eq!(cache.get(&"forever"), Some(&1));
        assert_eq!(cache.get(&"hours"), Some(&2));
    }
}
