//! Response wrapper carrying cache-provenance metadata.
//!
//! Every successful `execute` returns a [`CachedResponse`] that says which
//! tier produced the payload, so callers can distinguish a free cache hit
//! from a fetch that consumed rate-limit budget.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::key::CacheKey;

/// Which tier satisfied a successful call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Served from the in-process LRU tier.
    Memory,
    /// Served from the persistent tier (and promoted into memory).
    Store,
    /// Fetched live from the external provider.
    Upstream,
}

impl ResponseSource {
    /// True for the two cache tiers, false for a live fetch.
    pub fn is_cached(self) -> bool {
        !matches!(self, Self::Upstream)
    }
}

/// Successful result of a cache-aside call.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    key: CacheKey,
    data: Value,
    source: ResponseSource,
}

impl CachedResponse {
    pub fn new(key: CacheKey, data: Value, source: ResponseSource) -> Self {
        Self { key, data, source }
    }

    /// The derived key this response is stored under.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn into_data(self) -> Value {
        self.data
    }

    pub fn source(&self) -> ResponseSource {
        self.source
    }

    /// Whether the payload came from a cache tier rather than a live fetch.
    pub fn cached(&self) -> bool {
        self.source.is_cached()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::derive_key;
    use serde_json::json;

    fn key() -> CacheKey {
        derive_key("places", "details", &json!({"id": "x"})).expect("derive should succeed")
    }

    #[test]
    fn test_cached_flag_per_source() {
        let hit = CachedResponse::new(key(), json!({"a": 1}), ResponseSource::Memory);
        assert!(hit.cached());

        let promoted = CachedResponse::new(key(), json!({"a": 1}), ResponseSource::Store);
        assert!(promoted.cached());

        let fresh = CachedResponse::new(key(), json!({"a": 1}), ResponseSource::Upstream);
        assert!(!fresh.cached());
    }

    #[test]
    fn test_into_data() {
        let response = CachedResponse::new(key(), json!({"results": [1, 2]}), ResponseSource::Store);
        assert_eq!(response.data()["results"][0], 1);
        assert_eq!(response.into_data(), json!({"results": [1, 2]}));
    }
}
