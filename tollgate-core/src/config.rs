//! Configuration for the cache tiers and the rate limiter.
//!
//! Both configs are read once at construction time; there is no runtime
//! reconfiguration. Defaults follow the production deployment this engine
//! was extracted from: a 500-entry memory tier, 7-day TTL, 10 requests per
//! actor per hour and 100 requests globally per hour.

use std::time::Duration;

use crate::entry::DEFAULT_TTL;

/// Default capacity of the in-process memory tier.
pub const DEFAULT_MEMORY_CAPACITY: usize = 500;

/// Default per-actor admission limit per window.
pub const DEFAULT_PER_ACTOR_LIMIT: u32 = 10;

/// Default global admission limit per window.
pub const DEFAULT_GLOBAL_LIMIT: u32 = 100;

/// Default rate-limit window: one hour.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(3600);

/// Configuration for the two cache tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries held by the memory tier.
    pub memory_capacity: usize,
    /// TTL applied when a request does not override it.
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            default_ttl: DEFAULT_TTL,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_capacity(mut self, capacity: usize) -> Self {
        self.memory_capacity = capacity;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
}

/// Configuration for the sliding-window rate limiter.
///
/// Both limits share one window length and are enforced simultaneously; a
/// request is admitted only when neither scope is exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum admissions per actor per window.
    pub per_actor_limit: u32,
    /// Maximum admissions across all actors per window.
    pub global_limit: u32,
    /// Length of the trailing window.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_actor_limit: DEFAULT_PER_ACTOR_LIMIT,
            global_limit: DEFAULT_GLOBAL_LIMIT,
            window: DEFAULT_WINDOW,
        }
    }
}

impl RateLimitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_per_actor_limit(mut self, limit: u32) -> Self {
        self.per_actor_limit = limit;
        self
    }

    pub fn with_global_limit(mut self, limit: u32) -> Self {
        self.global_limit = limit;
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}
