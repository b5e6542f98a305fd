//! Bounded in-process LRU tier.
//!
//! A read-through accelerator over the persistent tier, never a source of
//! truth: entries are lost on restart by design, and every entry it holds is
//! owned exclusively behind the tier's mutex. Reads clone the entry out
//! rather than sharing references.
//!
//! # Concurrency
//!
//! This is the one structure in the engine where concurrent reads and writes
//! race: a `get` reorders the recency list, a `put` may evict. A single
//! mutex serializes all of it, so no two concurrent `put`s can corrupt the
//! ordering and no `get` can observe a partially-inserted entry. A poisoned
//! mutex degrades to miss/no-op; the persistent tier still answers.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use chrono::Utc;
use lru::LruCache;
use tollgate_core::{CacheEntry, CacheKey};

/// Counters and occupancy for the memory tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTierStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries pushed out by capacity pressure.
    pub evictions: u64,
    /// Entries dropped on read because their expiry had passed.
    pub expired_drops: u64,
    pub len: usize,
    pub capacity: usize,
}

impl MemoryTierStats {
    /// Hit rate over all lookups (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct MemoryTierInner {
    entries: LruCache<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expired_drops: u64,
}

/// Bounded, thread-safe LRU cache of recent responses.
pub struct MemoryTier {
    inner: Mutex<MemoryTierInner>,
    capacity: usize,
}

impl MemoryTier {
    /// Create a tier holding at most `capacity` entries (clamped to >= 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(MemoryTierInner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
                expired_drops: 0,
            }),
            capacity: capacity.get(),
        }
    }

    /// Look up a live entry, promoting it to most-recently-used.
    ///
    /// An expired entry is dropped on the spot and reported absent: stale
    /// data must never reach a caller, and eager removal keeps the recency
    /// list free of dead weight.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let Ok(mut guard) = self.inner.lock() else {
            return None;
        };
        let inner = &mut *guard;
        let now = Utc::now();

        let expired = match inner.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                inner.hits += 1;
                return Some(entry.clone());
            }
            Some(_) => true,
            None => false,
        };

        inner.misses += 1;
        if expired {
            inner.entries.pop(key);
            inner.expired_drops += 1;
        }
        None
    }

    /// Insert an entry as most-recently-used, evicting the least-recently
    /// used entry if the tier is at capacity.
    pub fn put(&self, entry: CacheEntry) {
        let Ok(mut guard) = self.inner.lock() else {
            return;
        };
        let inner = &mut *guard;

        let key = entry.key.clone();
        if let Some((displaced_key, _)) = inner.entries.push(key.clone(), entry) {
            // push returns the old value when the key was already present;
            // only count a genuine capacity eviction.
            if displaced_key != key {
                inner.evictions += 1;
            }
        }
    }

    /// Drop every entry whose expiry has passed; returns how many.
    pub fn evict_expired(&self) -> usize {
        let Ok(mut guard) = self.inner.lock() else {
            return 0;
        };
        let inner = &mut *guard;
        let now = Utc::now();

        let expired_keys: Vec<CacheKey> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            inner.entries.pop(key);
        }
        inner.expired_drops += expired_keys.len() as u64;
        expired_keys.len()
    }

    /// Remove everything, keeping the counters.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|g| g.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> MemoryTierStats {
        let Ok(guard) = self.inner.lock() else {
            return MemoryTierStats {
                capacity: self.capacity,
                ..Default::default()
            };
        };
        MemoryTierStats {
            hits: guard.hits,
            misses: guard.misses,
            evictions: guard.evictions,
            expired_drops: guard.expired_drops,
            len: guard.entries.len(),
            capacity: self.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tollgate_core::derive_key;

    fn make_entry(id: u32) -> CacheEntry {
        make_entry_with_ttl(id, Duration::from_secs(60))
    }

    fn make_entry_with_ttl(id: u32, ttl: Duration) -> CacheEntry {
        let params = json!({"id": id});
        let key = derive_key("places", "nearby_search", &params).expect("derive should succeed");
        CacheEntry::new(key, "places", "nearby_search", params, json!({"n": id}), ttl)
    }

    fn make_expired_entry(id: u32) -> CacheEntry {
        let params = json!({"id": id});
        let key = derive_key("places", "nearby_search", &params).expect("derive should succeed");
        CacheEntry::with_created_at(
            key,
            "places",
            "nearby_search",
            params,
            json!({"n": id}),
            Utc::now() - chrono::Duration::seconds(120),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_put_and_get() {
        let tier = MemoryTier::new(4);
        let entry = make_entry(1);
        tier.put(entry.clone());

        let got = tier.get(&entry.key).expect("entry should be present");
        assert_eq!(got.response_data, entry.response_data);
    }

    #[test]
    fn test_get_missing() {
        let tier = MemoryTier::new(4);
        let entry = make_entry(1);
        assert!(tier.get(&entry.key).is_none());
    }

    #[test]
    fn test_capacity_eviction_is_lru() {
        let tier = MemoryTier::new(3);
        let entries: Vec<CacheEntry> = (0..4).map(make_entry).collect();

        for entry in entries.iter().take(3) {
            tier.put(entry.clone());
        }
        // Inserting a 4th entry evicts exactly the least-recently-used (the
        // first), nothing else.
        tier.put(entries[3].clone());

        assert!(tier.get(&entries[0].key).is_none());
        assert!(tier.get(&entries[1].key).is_some());
        assert!(tier.get(&entries[2].key).is_some());
        assert!(tier.get(&entries[3].key).is_some());
        assert_eq!(tier.stats().evictions, 1);
    }

    #[test]
    fn test_get_protects_from_eviction() {
        let tier = MemoryTier::new(3);
        let entries: Vec<CacheEntry> = (0..4).map(make_entry).collect();

        for entry in entries.iter().take(3) {
            tier.put(entry.clone());
        }
        // Touch the oldest entry; the next insert must evict entry 1 instead.
        assert!(tier.get(&entries[0].key).is_some());
        tier.put(entries[3].clone());

        assert!(tier.get(&entries[0].key).is_some());
        assert!(tier.get(&entries[1].key).is_none());
        assert!(tier.get(&entries[2].key).is_some());
        assert!(tier.get(&entries[3].key).is_some());
    }

    #[test]
    fn test_reinsert_same_key_is_not_an_eviction() {
        let tier = MemoryTier::new(2);
        let entry = make_entry(1);
        tier.put(entry.clone());
        tier.put(entry.clone());

        assert_eq!(tier.len(), 1);
        assert_eq!(tier.stats().evictions, 0);
    }

    #[test]
    fn test_expired_entry_is_dropped_on_read() {
        let tier = MemoryTier::new(4);
        let entry = make_expired_entry(1);
        tier.put(entry.clone());
        assert_eq!(tier.len(), 1);

        assert!(tier.get(&entry.key).is_none());
        assert_eq!(tier.len(), 0, "expired entry is removed eagerly");
        assert_eq!(tier.stats().expired_drops, 1);
    }

    #[test]
    fn test_evict_expired() {
        let tier = MemoryTier::new(8);
        tier.put(make_entry(1));
        tier.put(make_expired_entry(2));
        tier.put(make_expired_entry(3));

        assert_eq!(tier.evict_expired(), 2);
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn test_stats_counters() {
        let tier = MemoryTier::new(4);
        let entry = make_entry(1);
        let other = make_entry(2);

        tier.put(entry.clone());
        let _ = tier.get(&entry.key);
        let _ = tier.get(&entry.key);
        let _ = tier.get(&other.key);

        let stats = tier.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.len, 1);
        assert_eq!(stats.capacity, 4);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 0.001);
    }

    #[test]
    fn test_zero_capacity_clamps_to_one() {
        let tier = MemoryTier::new(0);
        assert_eq!(tier.capacity(), 1);

        let a = make_entry(1);
        let b = make_entry(2);
        tier.put(a.clone());
        tier.put(b.clone());
        assert!(tier.get(&a.key).is_none());
        assert!(tier.get(&b.key).is_some());
    }

    #[test]
    fn test_clear() {
        let tier = MemoryTier::new(4);
        tier.put(make_entry(1));
        tier.put(make_entry(2));
        tier.clear();
        assert!(tier.is_empty());
    }
}
