//! Persistent-tier trait and storage statistics.
//!
//! The persistent tier is the durable source of truth underneath the memory
//! tier. Implementations must provide atomic upserts and atomic hit
//! accounting; concurrency control is delegated to the backing store's
//! native transaction guarantees.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tollgate_core::{CacheEntry, CacheKey, TollgateResult};

/// Durable key/value store for cached responses.
///
/// # Contract
///
/// - `get` must never return an expired entry; expired rows are treated as
///   absent and left in place for [`CacheStore::delete_expired`].
/// - `get` on a live entry increments `hit_count` and stamps
///   `last_accessed_at` as one atomic operation, then returns the updated
///   entry.
/// - `put` is an atomic upsert: re-caching a key overwrites the payload and
///   timestamps and resets the access-dependent fields, and no concurrent
///   reader may observe a half-written entry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a live entry by key, recording the hit.
    async fn get(&self, key: &CacheKey) -> TollgateResult<Option<CacheEntry>>;

    /// Insert or overwrite the entry for its key.
    async fn put(&self, entry: &CacheEntry) -> TollgateResult<()>;

    /// Physically remove rows whose expiry has passed.
    ///
    /// Purely storage reclamation; expired rows are already invisible to
    /// `get`. Safe to run concurrently with normal traffic, intended for a
    /// periodic external scheduler.
    async fn delete_expired(&self) -> TollgateResult<u64>;

    /// Aggregate statistics over all rows, including expired ones.
    async fn stats(&self) -> TollgateResult<StoreStats>;
}

/// Aggregate statistics for a persistent tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of rows, expired rows included.
    pub total_entries: u64,
    /// Rows past their expiry that the sweep has not yet reclaimed.
    pub expired_entries: u64,
    /// Sum of `hit_count` over all rows.
    pub total_hits: u64,
    /// Per-service breakdown.
    pub services: HashMap<String, ServiceStats>,
}

/// Statistics for a single external service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub entries: u64,
    pub hits: u64,
    /// Entry count per operation name.
    pub operations: HashMap<String, u64>,
}

impl StoreStats {
    /// Rows that are still servable.
    pub fn live_entries(&self) -> u64 {
        self.total_entries.saturating_sub(self.expired_entries)
    }

    /// Fold one entry into the aggregate. Implementations call this while
    /// scanning their rows.
    pub fn record_entry(&mut self, entry: &CacheEntry, now: DateTime<Utc>) {
        self.total_entries += 1;
        if entry.is_expired_at(now) {
            self.expired_entries += 1;
        }
        self.total_hits += entry.hit_count;

        let service = self.services.entry(entry.service_name.clone()).or_default();
        service.entries += 1;
        service.hits += entry.hit_count;
        *service.operations.entry(entry.operation.clone()).or_default() += 1;
    }
}
