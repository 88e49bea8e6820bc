//! Rolodex Storage
//!
//! The authoritative [`ContactStore`] contract, cache backends, and the
//! read-through / write-invalidate layer that keeps them consistent.

pub mod cache;
mod store;

pub use cache::{
    CacheBackend, CacheConfig, CacheError, CacheKey, CacheStats, CachedContactStore,
    CollectionPolicy, Expiry, InMemoryCacheBackend, LmdbCacheBackend, LmdbCacheError,
    RedisCacheBackend, WriteTtl,
};
pub use store::{ContactStore, InMemoryContactStore};
