//! Cache-aside facade over the two tiers and the rate limiter.
//!
//! Callers hand over a request description and a fetch closure; the facade
//! checks memory, then the persistent store, then (only on a full miss)
//! the rate limiter, and finally invokes the fetch, writing the result
//! through to both tiers.
//!
//! Every call ends in exactly one of five terminal states: memory hit,
//! store hit, rate-limited, fresh fetch, or fetch failure.
//!
//! # Degradation
//!
//! Cache-tier failures never reach the caller: a failed store read becomes a
//! miss and a failed store write after a successful fetch is logged and
//! swallowed; the fresh data is valid even if it could not be memoized.
//! Only fetch failures and rate-limit rejections surface as errors.
//!
//! # Concurrency
//!
//! No single-flight deduplication: two concurrent misses for the same key
//! may both fetch. The engine optimizes repeated-over-time access, not
//! concurrent-at-this-instant access; coalescing would be an additive layer
//! in front of this one.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use tollgate_core::{
    derive_key, CacheConfig, CacheEntry, CachedResponse, FetchError, RateLimitConfig,
    ResponseSource, TollgateError, TollgateResult,
};

use crate::limiter::RateLimiter;
use crate::memory::{MemoryTier, MemoryTierStats};
use crate::traits::{CacheStore, StoreStats};

/// One wrapped external-API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    service_name: String,
    operation: String,
    params: Value,
    actor: Option<String>,
    ttl: Option<Duration>,
}

impl ApiRequest {
    pub fn new(
        service_name: impl Into<String>,
        operation: impl Into<String>,
        params: Value,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            operation: operation.into(),
            params,
            actor: None,
            ttl: None,
        }
    }

    /// Attribute the request to an actor for per-actor rate limiting.
    /// Without an actor only the global limit applies.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Override the configured default TTL for this call.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn params(&self) -> &Value {
        &self.params
    }
}

/// Cache-aside orchestrator.
///
/// An explicitly constructed component owned by the application's
/// composition root: capacity, TTL and limits are fixed at construction,
/// and separate instances share nothing, which keeps tests isolated.
pub struct CacheAside<S> {
    store: Arc<S>,
    memory: MemoryTier,
    limiter: RateLimiter,
    config: CacheConfig,
}

impl<S: CacheStore> CacheAside<S> {
    pub fn new(store: Arc<S>, cache_config: CacheConfig, limit_config: RateLimitConfig) -> Self {
        let memory = MemoryTier::new(cache_config.memory_capacity);
        Self {
            store,
            memory,
            limiter: RateLimiter::new(limit_config),
            config: cache_config,
        }
    }

    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, CacheConfig::default(), RateLimitConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn memory(&self) -> &MemoryTier {
        &self.memory
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Return the cached response for `request`, or execute `fetch` under
    /// the rate limiter and write the result through both tiers.
    ///
    /// # Errors
    ///
    /// - [`TollgateError::Key`]: parameters outside the JSON data model
    /// - [`TollgateError::RateLimited`]: full miss and no budget; no fetch
    ///   was attempted and nothing was written
    /// - [`TollgateError::Fetch`]: the external call itself failed; nothing
    ///   was cached
    pub async fn execute<F, Fut>(&self, request: ApiRequest, fetch: F) -> TollgateResult<CachedResponse>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, FetchError>>,
    {
        let ApiRequest {
            service_name,
            operation,
            params,
            actor,
            ttl,
        } = request;

        let key = derive_key(&service_name, &operation, &params)?;

        if let Some(entry) = self.memory.get(&key) {
            debug!(key = %key, service = %service_name, "memory tier hit");
            return Ok(CachedResponse::new(
                key,
                entry.response_data,
                ResponseSource::Memory,
            ));
        }

        match self.store.get(&key).await {
            Ok(Some(entry)) => {
                debug!(key = %key, service = %service_name, hits = entry.hit_count, "store hit");
                self.memory.put(entry.clone());
                return Ok(CachedResponse::new(
                    key,
                    entry.response_data,
                    ResponseSource::Store,
                ));
            }
            Ok(None) => {}
            Err(e) => {
                // A dead store must not fail the request; fall through to a
                // live fetch.
                warn!(key = %key, error = %e, "store read failed, treating as miss");
            }
        }

        self.limiter.check_and_record(actor.as_deref())?;

        let data = fetch().await.map_err(TollgateError::Fetch)?;

        let entry = CacheEntry::new(
            key.clone(),
            service_name,
            operation,
            params,
            data.clone(),
            ttl.unwrap_or(self.config.default_ttl),
        );
        if let Err(e) = self.store.put(&entry).await {
            warn!(key = %key, error = %e, "store write failed, returning uncached result");
        }
        self.memory.put(entry);

        Ok(CachedResponse::new(key, data, ResponseSource::Upstream))
    }

    /// Physically remove expired rows from the persistent tier. Intended
    /// for a periodic external scheduler.
    pub async fn delete_expired(&self) -> TollgateResult<u64> {
        self.store.delete_expired().await
    }

    /// Drop expired entries from the memory tier.
    pub fn evict_expired(&self) -> usize {
        self.memory.evict_expired()
    }

    pub async fn store_stats(&self) -> TollgateResult<StoreStats> {
        self.store.stats().await
    }

    pub fn memory_stats(&self) -> MemoryTierStats {
        self.memory.stats()
    }
}
