//! Cache layer for contact reads and writes.
//!
//! - [`traits`]: the byte-level [`CacheBackend`] boundary and [`CacheError`]
//! - [`key`]: typed keys rendering to `allContacts` / `contact:<id>`
//! - [`payload`]: one schema per key shape, validated on decode
//! - backends: [`InMemoryCacheBackend`], [`RedisCacheBackend`], [`LmdbCacheBackend`]
//! - [`read_through`]: [`CachedContactStore`], the consistency rules

pub mod key;
pub mod payload;
pub mod read_through;
pub mod traits;

mod lmdb_backend;
mod memory_backend;
mod redis_backend;

pub use key::{CacheKey, COLLECTION_KEY, RECORD_KEY_PREFIX};
pub use lmdb_backend::{LmdbCacheBackend, LmdbCacheError};
pub use memory_backend::{Expiry, InMemoryCacheBackend};
pub use payload::PayloadError;
pub use read_through::{CacheConfig, CachedContactStore, CollectionPolicy, WriteTtl};
pub use redis_backend::RedisCacheBackend;
pub use traits::{CacheBackend, CacheError, CacheStats};
