//! Hash-map persistent tier for tests and single-process deployments.
//!
//! Implements the full [`CacheStore`] contract (expiry filtering, hit
//! accounting, upsert, sweep, stats) without touching disk. Durability is
//! the process lifetime; production deployments use the LMDB store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use tollgate_core::{CacheEntry, CacheKey, StoreError, TollgateResult};

use crate::traits::{CacheStore, StoreStats};

/// In-process [`CacheStore`] backed by a `RwLock<HashMap>`.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<E>(_: E) -> tollgate_core::TollgateError {
    StoreError::Unavailable {
        reason: "store lock poisoned".to_string(),
    }
    .into()
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, key: &CacheKey) -> TollgateResult<Option<CacheEntry>> {
        let now = Utc::now();
        let mut entries = self.entries.write().map_err(poisoned)?;

        let Some(entry) = entries.get_mut(key) else {
            return Ok(None);
        };
        if entry.is_expired_at(now) {
            // Left in place for delete_expired.
            return Ok(None);
        }

        entry.record_hit_at(now);
        Ok(Some(entry.clone()))
    }

    async fn put(&self, entry: &CacheEntry) -> TollgateResult<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    async fn delete_expired(&self) -> TollgateResult<u64> {
        let now = Utc::now();
        let mut entries = self.entries.write().map_err(poisoned)?;

        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        Ok((before - entries.len()) as u64)
    }

    async fn stats(&self) -> TollgateResult<StoreStats> {
        let now = Utc::now();
        let entries = self.entries.read().map_err(poisoned)?;

        let mut stats = StoreStats::default();
        for entry in entries.values() {
            stats.record_entry(entry, now);
        }
        Ok(stats)
    }
}
