//! Tollgate Core - Data Types and Key Derivation
//!
//! Pure data structures for the tollgate external-API response cache: cache
//! keys, cached entries, configuration and the error taxonomy. No I/O lives
//! here; the tiers and the cache-aside facade are in `tollgate-storage`.

pub mod config;
pub mod entry;
pub mod error;
pub mod key;
pub mod response;

pub use config::{
    CacheConfig, RateLimitConfig, DEFAULT_GLOBAL_LIMIT, DEFAULT_MEMORY_CAPACITY,
    DEFAULT_PER_ACTOR_LIMIT, DEFAULT_WINDOW,
};
pub use entry::{CacheEntry, DEFAULT_TTL};
pub use error::{
    FetchError, FetchErrorKind, KeyError, LimitScope, RateLimitExceeded, StoreError,
    TollgateError, TollgateResult,
};
pub use key::{derive_key, CacheKey, KEY_HEX_LEN};
pub use response::{CachedResponse, ResponseSource};
