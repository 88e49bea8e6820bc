//! Cache backend trait and cache error types.
//!
//! Backends move opaque bytes under string keys. Encoding, key naming, and
//! consistency rules live above this boundary in the read-through layer.

use std::time::Duration;

use async_trait::async_trait;
use rolodex_core::RolodexError;
use thiserror::Error;

/// Errors raised by a cache backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The backend cannot be reached (disconnected, refused, timed out).
    #[error("Cache unavailable: {reason}")]
    Unavailable { reason: String },

    /// The backend answered but the operation failed.
    #[error("Cache backend error: {reason}")]
    Backend { reason: String },

    /// A value could not be encoded for the cache.
    #[error("Cache serialization error: {reason}")]
    Serialization { reason: String },
}

impl CacheError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }

    /// Transient failures the read-through layer may degrade past.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl From<CacheError> for RolodexError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Unavailable { reason } => RolodexError::unavailable("cache", reason),
            other => RolodexError::internal(other.to_string()),
        }
    }
}

/// Cache backend trait for pluggable cache implementations.
///
/// Implementations must be safe for concurrent use. Once `disconnect` has
/// completed, every other operation fails with [`CacheError::Unavailable`].
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short name used in logs and health output.
    fn name(&self) -> &'static str;

    /// Fetch the raw value stored under `key`, if any and not expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store `value` under `key`, expiring after `ttl`.
    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration)
        -> Result<(), CacheError>;

    /// Store `value` under `key` with no expiry. Replaces any previous TTL.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Round-trip to the backend.
    async fn ping(&self) -> Result<(), CacheError>;

    /// Release the connection. Idempotent.
    async fn disconnect(&self) -> Result<(), CacheError>;
}

/// Statistics about cache usage as seen by the read-through layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from the cache.
    pub hits: u64,
    /// Reads that went to the store.
    pub misses: u64,
    /// Entries that failed schema validation and were discarded.
    pub corrupt_entries: u64,
    /// Cache operations skipped because the backend was unavailable.
    pub degraded_ops: u64,
    /// Successful cache writes.
    pub writes: u64,
    /// Successful cache deletes.
    pub invalidations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
