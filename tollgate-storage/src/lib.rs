//! Tollgate Storage - Cache Tiers, Rate Limiter and Cache-Aside Facade
//!
//! This crate implements the engine behind tollgate: a two-tier exact-match
//! response cache for metered external APIs, with a sliding-window rate
//! limiter guarding the miss path.
//!
//! # Design Philosophy
//!
//! Every external call costs money, so the engine is built around one
//! observation: the same request repeated over time should be billed once.
//! Lookups are exact-match only (keys are derived from the canonicalized
//! parameters, never from fuzzy equivalence), trading recall for a zero
//! false-positive guarantee. Rate-limit budget is charged exclusively on the
//! miss path; a cached response is free no matter how often it is repeated.
//!
//! # Tiers
//!
//! - [`MemoryTier`]: bounded in-process LRU, an accelerator that loses its
//!   contents on restart by design.
//! - [`CacheStore`]: the durable source of truth underneath it, implemented
//!   by [`LmdbCacheStore`] (memory-mapped LMDB) and [`InMemoryStore`]
//!   (tests, single-process deployments).
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tollgate_core::{CacheConfig, RateLimitConfig};
//! use tollgate_storage::{ApiRequest, CacheAside, LmdbCacheStore};
//!
//! let store = Arc::new(LmdbCacheStore::new("/var/cache/tollgate", 100)?);
//! let cache = CacheAside::new(store, CacheConfig::default(), RateLimitConfig::default());
//!
//! let request = ApiRequest::new(
//!     "places",
//!     "nearby_search",
//!     serde_json::json!({"location": "40.7,-74.0", "radius": 5000}),
//! )
//! .with_actor(user_id);
//!
//! let response = cache.execute(request, || places.nearby_search(&params)).await?;
//! if response.cached() {
//!     // served without touching the metered API
//! }
//! ```

pub mod cache_aside;
pub mod in_memory;
pub mod limiter;
pub mod lmdb_store;
pub mod memory;
pub mod traits;

pub use cache_aside::{ApiRequest, CacheAside};
pub use in_memory::InMemoryStore;
pub use limiter::{RateLimiter, RemainingQuota};
pub use lmdb_store::{LmdbCacheStore, LmdbStoreError};
pub use memory::{MemoryTier, MemoryTierStats};
pub use traits::{CacheStore, ServiceStats, StoreStats};
