//! Error types for tollgate operations

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Persistent-tier errors.
///
/// These never reach callers of the cache-aside facade: a failed store read
/// is downgraded to a cache miss and a failed store write is logged and
/// swallowed. They surface only when the store is used directly.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Transaction failed: {reason}")]
    Transaction { reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Deserialization failed: {reason}")]
    Deserialization { reason: String },
}

/// Key derivation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    /// The supplied parameters cannot be represented in the JSON data model
    /// (e.g. a non-finite float or a map with non-string keys). This is a
    /// caller bug, not a runtime condition.
    #[error("Parameters are not JSON-representable: {reason}")]
    Unserializable { reason: String },
}

/// Classification of a failed external fetch.
///
/// Derived from whatever status or category the wrapped call reports. The
/// split matters to callers: `Auth` and `Quota` will keep failing until an
/// operator intervenes, while `Server` and `Timeout` are worth retrying
/// later (never retried by tollgate itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// Authentication or authorization failure at the external provider.
    Auth,
    /// The external provider reports its own quota as exhausted. Distinct
    /// from tollgate's rate limiter rejecting the request.
    Quota,
    /// Transient-looking upstream failure (5xx-equivalent).
    Server,
    /// The call did not complete within the caller-configured deadline.
    Timeout,
}

impl FetchErrorKind {
    /// Stable wire code for this kind.
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Auth => "auth_error",
            Self::Quota => "quota_error",
            Self::Server => "server_error",
            Self::Timeout => "timeout",
        }
    }

    /// Whether a later retry has a chance of succeeding without operator
    /// intervention.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Server | Self::Timeout)
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// Error reported by a wrapped external call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Auth, message)
    }

    pub fn quota(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Quota, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Server, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Timeout, message)
    }

    /// Classify an HTTP-style status code from the external provider.
    ///
    /// 401/403 map to `Auth`, 429 to `Quota`, everything else (5xx included)
    /// to `Server`.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => Self::auth(format!("authentication failed ({status}): {body}")),
            429 => Self::quota(format!("provider quota exceeded: {body}")),
            _ => Self::server(format!("upstream error ({status}): {body}")),
        }
    }
}

/// Scope of the limit that rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LimitScope {
    PerActor,
    Global,
}

impl fmt::Display for LimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerActor => f.write_str("per-actor"),
            Self::Global => f.write_str("global"),
        }
    }
}

/// Rejection from the sliding-window rate limiter.
///
/// `retry_after` estimates when the window frees capacity; it is always at
/// least one second.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Rate limit exceeded ({scope}); retry after {}s", .retry_after.as_secs())]
pub struct RateLimitExceeded {
    pub scope: LimitScope,
    pub retry_after: Duration,
}

/// Master error type for all tollgate operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TollgateError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("{0}")]
    RateLimited(#[from] RateLimitExceeded),
}

impl TollgateError {
    /// Stable wire code, suitable for surfacing to calling applications.
    ///
    /// One of `rate_limited`, `auth_error`, `quota_error`, `server_error`,
    /// `timeout`, `store_error`, `invalid_params`.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::RateLimited(_) => "rate_limited",
            Self::Fetch(e) => e.kind.as_code(),
            Self::Store(_) => "store_error",
            Self::Key(_) => "invalid_params",
        }
    }

    /// Seconds-until-capacity hint, present only for rate-limit rejections.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited(e) => Some(e.retry_after),
            _ => None,
        }
    }
}

/// Result type alias for tollgate operations.
pub type TollgateResult<T> = Result<T, TollgateError>;
