//! LMDB-backed persistent tier.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a memory-mapped,
//! transactional key-value store for cached responses. Rows are keyed by the
//! 64-character hex cache key and hold the JSON-serialized [`CacheEntry`].
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The store uses:
//! - Write transactions for `get` (hit accounting mutates the row), `put`
//!   and `delete_expired`, so the increment-and-stamp on a hit is atomic
//! - Read transactions for `stats`
//!
//! # Failure Semantics
//!
//! Every failure maps to a typed [`StoreError`]; the cache-aside facade
//! downgrades read failures to misses and swallows write failures, so an
//! unavailable store never fails a request that a live fetch could serve.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use tollgate_core::{CacheEntry, CacheKey, StoreError, TollgateError, TollgateResult};

use crate::traits::{CacheStore, StoreStats};

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for TollgateError {
    fn from(e: LmdbStoreError) -> Self {
        let store_error = match e {
            LmdbStoreError::EnvOpen(reason) | LmdbStoreError::DbOpen(reason) => {
                StoreError::Unavailable { reason }
            }
            LmdbStoreError::Transaction(reason) => StoreError::Transaction { reason },
            LmdbStoreError::Serialization(reason) => StoreError::Serialization { reason },
            LmdbStoreError::Deserialization(reason) => StoreError::Deserialization { reason },
            LmdbStoreError::Io(err) => StoreError::Unavailable {
                reason: err.to_string(),
            },
        };
        TollgateError::Store(store_error)
    }
}

/// LMDB-backed [`CacheStore`].
///
/// # Example
///
/// ```ignore
/// use tollgate_storage::LmdbCacheStore;
///
/// let store = LmdbCacheStore::new("/var/cache/tollgate", 100)?;
/// store.put(&entry).await?;
/// let cached = store.get(&entry.key).await?;
/// ```
pub struct LmdbCacheStore {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Str, Bytes>,
}

impl LmdbCacheStore {
    /// Create a new LMDB store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the LMDB
    /// environment cannot be opened, or the database cannot be created.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let db: Database<Str, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(Self { env, db })
    }
}

#[async_trait]
impl CacheStore for LmdbCacheStore {
    async fn get(&self, key: &CacheKey) -> TollgateResult<Option<CacheEntry>> {
        let now = Utc::now();

        // Hit accounting mutates the row, so the whole lookup runs in one
        // write transaction.
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let decoded = {
            let raw = self
                .db
                .get(&wtxn, key.as_str())
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
            match raw {
                Some(bytes) => Some(
                    serde_json::from_slice::<CacheEntry>(bytes)
                        .map_err(|e| LmdbStoreError::Deserialization(e.to_string()))?,
                ),
                None => None,
            }
        };

        let Some(mut entry) = decoded else {
            return Ok(None);
        };
        if entry.is_expired_at(now) {
            // Expired rows stay in place for delete_expired.
            return Ok(None);
        }

        entry.record_hit_at(now);
        let raw = serde_json::to_vec(&entry)
            .map_err(|e| LmdbStoreError::Serialization(e.to_string()))?;
        self.db
            .put(&mut wtxn, key.as_str(), &raw)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(Some(entry))
    }

    async fn put(&self, entry: &CacheEntry) -> TollgateResult<()> {
        let raw = serde_json::to_vec(entry)
            .map_err(|e| LmdbStoreError::Serialization(e.to_string()))?;

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, entry.key.as_str(), &raw)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(())
    }

    async fn delete_expired(&self) -> TollgateResult<u64> {
        let now = Utc::now();

        // Collect expired keys under a read transaction, then delete in a
        // write transaction. Rows inserted in between simply wait for the
        // next sweep.
        let expired_keys = {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

            let iter = self
                .db
                .iter(&rtxn)
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

            let mut keys = Vec::new();
            for result in iter {
                let Ok((key, value)) = result else { continue };
                let Ok(entry) = serde_json::from_slice::<CacheEntry>(value) else {
                    continue;
                };
                if entry.is_expired_at(now) {
                    keys.push(key.to_string());
                }
            }
            keys
        };

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let mut deleted = 0u64;
        for key in &expired_keys {
            if self.db.delete(&mut wtxn, key).unwrap_or(false) {
                deleted += 1;
            }
        }

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(deleted)
    }

    async fn stats(&self) -> TollgateResult<StoreStats> {
        let now = Utc::now();
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let iter = self
            .db
            .iter(&rtxn)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let mut stats = StoreStats::default();
        for result in iter {
            let Ok((_, value)) = result else { continue };
            let Ok(entry) = serde_json::from_slice::<CacheEntry>(value) else {
                continue;
            };
            stats.record_entry(&entry, now);
        }
        Ok(stats)
    }
}
