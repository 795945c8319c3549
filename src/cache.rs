//! A small, bounded, thread-safe LRU cache.
//!
//! Capacities in this crate never exceed ten entries (§3), so a linear scan
//! with move-to-front is simpler and just as fast as a hash map plus
//! intrusive linked list, and it is what the reference renderer's own
//! `utils/lru_cache.h` does.

use std::sync::Mutex;

struct Entry<K, V> {
    key: K,
    value: V,
}

/// Bounded, thread-safe, recency-ordered cache. All operations serialize on
/// a single mutex; after any operation, `len() <= capacity` and each key
/// appears at most once.
pub struct LruCache<K, V> {
    capacity: usize,
    entries: Mutex<Vec<Entry<K, V>>>,
}

impl<K, V> LruCache<K, V>
where
    K: PartialEq + Clone,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Look up `key`. On hit, moves the entry to the most-recent (front)
    /// position and returns a clone of its value.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().unwrap();
        let idx = entries.iter().position(|e| &e.key == key)?;
        let entry = entries.remove(idx);
        let value = entry.value.clone();
        entries.insert(0, entry);
        Some(value)
    }

    /// Insert or update `key`. Existing keys are replaced and moved to
    /// front; a novel key at capacity evicts the least-recent (tail) entry.
    pub fn put(&self, key: K, value: V) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(idx) = entries.iter().position(|e| e.key == key) {
            entries.remove(idx);
        } else if entries.len() == self.capacity {
            entries.pop();
        }
        entries.insert(0, Entry { key, value });
    }

    /// Entries in recency order, most-recent first. Test-only.
    #[cfg(test)]
    pub fn snapshot(&self) -> Vec<(K, V)> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| (e.key.clone(), e.value.clone()))
            .collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}
