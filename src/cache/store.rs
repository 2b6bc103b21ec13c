//! Node Store Module
//!
//! Bounded per-node store combining HashMap storage with LRU eviction
//! and TTL expiration. One instance holds a single node's share of the
//! keyspace; the cluster service creates one per registered node.

use std::collections::HashMap;

use crate::cache::{CacheEntry, CacheStats, LruOrder, MAX_KEY_LENGTH, MAX_VALUE_SIZE};
use crate::error::{CacheError, Result};

// == Node Store ==
/// Bounded key-value store with LRU eviction and TTL support.
///
/// `len()` counts not-yet-swept expired entries; expired entries are
/// removed lazily on `get` and in bulk by `sweep_expired`.
#[derive(Debug)]
pub struct NodeStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Access-order tracker for eviction
    lru: LruOrder,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    capacity: usize,
}

impl NodeStore {
    // == Constructor ==
    /// Creates a new NodeStore with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruOrder::new(),
            stats: CacheStats::new(),
            capacity,
        }
    }

    // == Put ==
    /// Stores a key-value pair.
    ///
    /// Overwriting an existing key replaces its value and resets its
    /// creation time and TTL. Inserting a new key at capacity evicts the
    /// least recently used entry first; the eviction candidate is picked
    /// strictly by recency, regardless of expiry state.
    ///
    /// `ttl_ms == 0` means the entry never expires.
    pub fn put(&mut self, key: String, value: String, ttl_ms: u64) -> Result<()> {
        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidRequest(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }

        if value.len() > MAX_VALUE_SIZE {
            return Err(CacheError::InvalidRequest(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }

        self.insert_entry(key, CacheEntry::new(value, ttl_ms))
    }

    // == Insert Entry ==
    /// Inserts a pre-built entry, evicting the LRU entry if needed.
    ///
    /// Used by `put` and by rebalance migration, which must preserve an
    /// entry's original creation time and expiry deadline.
    pub fn insert_entry(&mut self, key: String, entry: CacheEntry) -> Result<()> {
        let is_overwrite = self.entries.contains_key(&key);

        if !is_overwrite && self.entries.len() >= self.capacity {
            if let Some(evicted) = self.lru.pop_lru() {
                self.entries.remove(&evicted);
                self.stats.record_eviction();
            } else {
                return Err(CacheError::StoreFull(
                    "store is at capacity with no evictable entry".to_string(),
                ));
            }
        }

        self.lru.touch(&key);
        self.entries.insert(key, entry);
        self.stats.set_total_entries(self.entries.len());

        Ok(())
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns None for absent keys and for expired entries; an expired
    /// entry is removed on the way out. A successful read marks the
    /// entry most recently used.
    pub fn get(&mut self, key: &str) -> Option<String> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired() {
                self.entries.remove(key);
                self.lru.remove(key);
                self.stats.record_expiration();
                self.stats.record_miss();
                self.stats.set_total_entries(self.entries.len());
                return None;
            }

            let value = entry.value.clone();
            self.stats.record_hit();
            self.lru.touch(key);
            Some(value)
        } else {
            self.stats.record_miss();
            None
        }
    }

    // == Delete ==
    /// Removes an entry by key; returns whether one was present.
    pub fn delete(&mut self, key: &str) -> bool {
        self.remove_entry(key).is_some()
    }

    // == Remove Entry ==
    /// Removes and returns an entry without touching the hit/miss
    /// counters. Rebalancing uses this to take an entry out of a store
    /// it no longer belongs to.
    pub fn remove_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(key);
        self.stats.set_total_entries(self.entries.len());
        Some(entry)
    }

    // == Take Entries ==
    /// Drains every entry out of the store, leaving it empty.
    ///
    /// Used when a node leaves the cluster and its store is handed to
    /// the rebalance worker for migration.
    pub fn take_entries(&mut self) -> Vec<(String, CacheEntry)> {
        let drained: Vec<(String, CacheEntry)> = self.entries.drain().collect();
        self.lru.clear();
        self.stats.set_total_entries(0);
        drained
    }

    // == Keys ==
    /// Returns a snapshot of all stored keys, including not-yet-swept
    /// expired ones.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    // == Contains ==
    /// Checks whether a live (non-expired) entry exists for the key,
    /// without updating recency or statistics.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    // == Sweep Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&mut self) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();

        for key in expired_keys {
            self.entries.remove(&key);
            self.lru.remove(&key);
            self.stats.record_expiration();
        }

        self.stats.set_total_entries(self.entries.len());
        count
    }

    // == Stats ==
    /// Returns current store statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    // == Length ==
    /// Returns the current number of entries in the store.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Capacity ==
    /// Returns the configured maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_store_new() {
        let store = NodeStore::new(100);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.capacity(), 100);
    }

    #[test]
    fn test_store_put_and_get() {
        let mut store = NodeStore::new(100);

        store.put("key1".to_string(), "value1".to_string(), 0).unwrap();

        assert_eq!(store.get("key1"), Some("value1".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = NodeStore::new(100);
        assert_eq!(store.get("nonexistent"), None);
    }

    #[test]
    fn test_store_delete() {
        let mut store = NodeStore::new(100);

        store.put("key1".to_string(), "value1".to_string(), 0).unwrap();

        assert!(store.delete("key1"));
        assert!(store.is_empty());
        assert_eq!(store.get("key1"), None);
    }

    #[test]
    fn test_store_delete_nonexistent_is_noop() {
        let mut store = NodeStore::new(100);
        assert!(!store.delete("nonexistent"));
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = NodeStore::new(100);

        store.put("key1".to_string(), "value1".to_string(), 0).unwrap();
        store.put("key1".to_string(), "value2".to_string(), 0).unwrap();

        assert_eq!(store.get("key1"), Some("value2".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_ttl_expiration() {
        let mut store = NodeStore::new(100);

        store.put("key1".to_string(), "value1".to_string(), 20).unwrap();

        assert!(store.get("key1").is_some());

        sleep(Duration::from_millis(50));

        assert_eq!(store.get("key1"), None);
        // Lazy expiry removed the entry
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_store_lru_eviction() {
        let mut store = NodeStore::new(3);

        store.put("key1".to_string(), "value1".to_string(), 0).unwrap();
        store.put("key2".to_string(), "value2".to_string(), 0).unwrap();
        store.put("key3".to_string(), "value3".to_string(), 0).unwrap();

        // Store is full, adding key4 evicts key1 (least recently used)
        store.put("key4".to_string(), "value4".to_string(), 0).unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.get("key1"), None);
        assert!(store.get("key2").is_some());
        assert!(store.get("key3").is_some());
        assert!(store.get("key4").is_some());
    }

    #[test]
    fn test_store_lru_touch_on_get() {
        let mut store = NodeStore::new(2);

        store.put("a".to_string(), "1".to_string(), 0).unwrap();
        store.put("b".to_string(), "2".to_string(), 0).unwrap();

        // Reading "a" makes "b" the eviction candidate
        store.get("a");
        store.put("c".to_string(), "3".to_string(), 0).unwrap();

        assert!(store.get("a").is_some());
        assert_eq!(store.get("b"), None);
        assert!(store.get("c").is_some());
    }

    #[test]
    fn test_store_capacity_zero_rejects_insert() {
        let mut store = NodeStore::new(0);

        let result = store.put("key".to_string(), "value".to_string(), 0);
        assert!(matches!(result, Err(CacheError::StoreFull(_))));
    }

    #[test]
    fn test_store_insert_entry_preserves_expiry() {
        let mut store = NodeStore::new(100);

        let entry = CacheEntry::new("value".to_string(), 30);
        let expires_at = entry.expires_at;
        store.insert_entry("key".to_string(), entry).unwrap();

        sleep(Duration::from_millis(60));

        assert_eq!(store.get("key"), None, "migrated deadline should hold");
        let fresh = CacheEntry::new("value".to_string(), 30);
        assert_ne!(fresh.expires_at, expires_at);
    }

    #[test]
    fn test_store_remove_entry_keeps_stats_quiet() {
        let mut store = NodeStore::new(100);

        store.put("key1".to_string(), "value1".to_string(), 0).unwrap();
        let entry = store.remove_entry("key1").unwrap();

        assert_eq!(entry.value, "value1");
        assert_eq!(store.len(), 0);

        let stats = store.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_store_take_entries_empties_store() {
        let mut store = NodeStore::new(100);

        store.put("a".to_string(), "1".to_string(), 0).unwrap();
        store.put("b".to_string(), "2".to_string(), 0).unwrap();

        let drained = store.take_entries();

        assert_eq!(drained.len(), 2);
        assert!(store.is_empty());
        assert_eq!(store.stats().total_entries, 0);

        // Store remains usable after the drain
        store.put("c".to_string(), "3".to_string(), 0).unwrap();
        assert!(store.get("c").is_some());
    }

    #[test]
    fn test_store_stats() {
        let mut store = NodeStore::new(100);

        store.put("key1".to_string(), "value1".to_string(), 0).unwrap();
        store.get("key1"); // hit
        store.get("nonexistent"); // miss

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
    }

    #[test]
    fn test_store_sweep_expired() {
        let mut store = NodeStore::new(100);

        store.put("key1".to_string(), "value1".to_string(), 20).unwrap();
        store.put("key2".to_string(), "value2".to_string(), 10_000).unwrap();

        sleep(Duration::from_millis(50));

        let removed = store.sweep_expired();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("key2").is_some());
        assert_eq!(store.stats().expirations, 1);
    }

    #[test]
    fn test_store_key_too_long() {
        let mut store = NodeStore::new(100);
        let long_key = "x".repeat(MAX_KEY_LENGTH + 1);

        let result = store.put(long_key, "value".to_string(), 0);
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[test]
    fn test_store_value_too_large() {
        let mut store = NodeStore::new(100);
        let large_value = "x".repeat(MAX_VALUE_SIZE + 1);

        let result = store.put("key".to_string(), large_value, 0);
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }
}
