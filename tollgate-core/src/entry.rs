//! Cached response entries.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::key::CacheKey;

/// Default time-to-live for cached responses: 7 days.
pub const DEFAULT_TTL: Duration = Duration::from_secs(604_800);

/// One cached external-API response.
///
/// `service_name`, `operation` and `request_params` are denormalized copies
/// kept for inspection, per-service statistics and debugging; lookups go
/// through `key` alone.
///
/// # Lifecycle
///
/// Created on a cache miss followed by a successful fetch; `hit_count` and
/// `last_accessed_at` advance on every subsequent persistent-tier hit; once
/// `expires_at` passes, lookups treat the entry as absent and the physical
/// row waits for the expiry sweep (or tier eviction) to reclaim it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub service_name: String,
    pub operation: String,
    pub request_params: Value,
    pub response_data: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub hit_count: u64,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Build a fresh entry expiring `ttl` from now.
    pub fn new(
        key: CacheKey,
        service_name: impl Into<String>,
        operation: impl Into<String>,
        request_params: Value,
        response_data: Value,
        ttl: Duration,
    ) -> Self {
        Self::with_created_at(
            key,
            service_name,
            operation,
            request_params,
            response_data,
            Utc::now(),
            ttl,
        )
    }

    /// Build an entry with an explicit creation time (restores, tests).
    pub fn with_created_at(
        key: CacheKey,
        service_name: impl Into<String>,
        operation: impl Into<String>,
        request_params: Value,
        response_data: Value,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::MAX);
        Self {
            key,
            service_name: service_name.into(),
            operation: operation.into(),
            request_params,
            response_data,
            created_at,
            expires_at: created_at + ttl,
            hit_count: 0,
            last_accessed_at: None,
        }
    }

    /// An entry is expired from the instant `expires_at` is reached.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Remaining lifetime at `now`, zero once expired.
    pub fn expires_in(&self, now: DateTime<Utc>) -> Duration {
        if now >= self.expires_at {
            return Duration::ZERO;
        }
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Record a successful read: bump the hit count and stamp the access
    /// time. Callers persist the mutation themselves.
    pub fn record_hit_at(&mut self, now: DateTime<Utc>) {
        self.hit_count += 1;
        self.last_accessed_at = Some(now);
    }
}
