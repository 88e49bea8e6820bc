//! Read-through / write-invalidate cache over the contact store.
//!
//! Every read and write path for contacts goes through [`CachedContactStore`].
//! Reads are served from the cache when an entry is present and valid, and
//! populate it on a miss. Writes go to the store first and then bring the
//! affected cache entries back in line.
//!
//! # Consistency
//!
//! - The store is authoritative. The cache reflects the most recent
//!   write-through performed by this layer for a key, never writes made
//!   elsewhere.
//! - Under [`CollectionPolicy::RetainOnUpdate`] a single-record update leaves
//!   the collection entry stale until it expires or a create/delete rewrites it.
//! - No locks are taken. Concurrent misses may both hit the store and both
//!   populate; concurrent deletes race on the collection entry and the last
//!   writer wins. TTL expiry is the only self-healing mechanism.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rolodex_core::{Contact, ContactId, ContactPatch, NewContact, RolodexError, RolodexResult};
use tracing::{debug, instrument, warn};

use super::key::CacheKey;
use super::payload::{self, PayloadError};
use super::traits::{CacheBackend, CacheError, CacheStats};
use crate::store::ContactStore;

/// Expiry applied when a write path overwrites an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteTtl {
    /// Every write carries the entry TTL.
    #[default]
    Reapply,
    /// Overwrites store without expiry; only read-miss population sets a TTL.
    Persist,
}

/// What a single-record update does to the collection entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionPolicy {
    /// Leave the collection entry as is. Readers may see the pre-update
    /// record in the list until the entry expires.
    #[default]
    RetainOnUpdate,
    /// Delete the collection entry so the next list read repopulates it.
    InvalidateOnUpdate,
}

impl FromStr for WriteTtl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reapply" => Ok(Self::Reapply),
            "persist" => Ok(Self::Persist),
            other => Err(format!("unknown write TTL mode '{}'", other)),
        }
    }
}

impl FromStr for CollectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retain" => Ok(Self::RetainOnUpdate),
            "invalidate" => Ok(Self::InvalidateOnUpdate),
            other => Err(format!("unknown collection policy '{}'", other)),
        }
    }
}

/// Configuration for the read-through cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub entry_ttl: Duration,
    /// Whether overwrites re-apply `entry_ttl`.
    pub write_ttl: WriteTtl,
    /// Collection handling on single-record update.
    pub collection_policy: CollectionPolicy,
    /// Degrade to the store when the cache is unreachable.
    pub fail_open: bool,
    /// Optional key prefix, rendered as `<namespace>:<key>`.
    pub namespace: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entry_ttl: Duration::from_secs(3600), // 1 hour
            write_ttl: WriteTtl::default(),
            collection_policy: CollectionPolicy::default(),
            fail_open: true,
            namespace: None,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    /// Set the overwrite TTL mode.
    pub fn with_write_ttl(mut self, mode: WriteTtl) -> Self {
        self.write_ttl = mode;
        self
    }

    /// Set the collection policy on update.
    pub fn with_collection_policy(mut self, policy: CollectionPolicy) -> Self {
        self.collection_policy = policy;
        self
    }

    /// Enable or disable fail-open on cache outages.
    pub fn with_fail_open(mut self, enabled: bool) -> Self {
        self.fail_open = enabled;
        self
    }

    /// Set the key namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

#[derive(Debug, Default)]
struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    corrupt_entries: AtomicU64,
    degraded_ops: AtomicU64,
    writes: AtomicU64,
    invalidations: AtomicU64,
}

impl StatsCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            corrupt_entries: self.corrupt_entries.load(Ordering::Relaxed),
            degraded_ops: self.degraded_ops.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

/// How a cache write was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    /// Filling an entry after a read miss.
    Populate,
    /// Replacing an entry after a mutation.
    Overwrite,
}

/// Read-through / write-invalidate layer for contacts.
///
/// # Type Parameters
///
/// - `S`: The authoritative contact store
/// - `C`: The cache backend holding serialized snapshots
///
/// Both default to trait objects so the API can pick implementations at
/// startup.
///
/// # Example
///
/// ```ignore
/// let layer = CachedContactStore::new(store, cache, CacheConfig::default());
///
/// let created = layer.create(NewContact::new("Ada", "ada@example.com", "555-0100")).await?;
/// let fetched = layer.read(created.id).await?; // populates contact:<id>
/// let again = layer.read(created.id).await?;   // served from cache
/// ```
pub struct CachedContactStore<S: ?Sized = dyn ContactStore, C: ?Sized = dyn CacheBackend> {
    store: Arc<S>,
    cache: Arc<C>,
    config: CacheConfig,
    stats: StatsCounters,
}

impl<S: ?Sized, C: ?Sized> fmt::Debug for CachedContactStore<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedContactStore")
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

impl<S, C> CachedContactStore<S, C>
where
    S: ContactStore + ?Sized,
    C: CacheBackend + ?Sized,
{
    pub fn new(store: Arc<S>, cache: Arc<C>, config: CacheConfig) -> Self {
        Self {
            store,
            cache,
            config,
            stats: StatsCounters::default(),
        }
    }

    /// Create a layer with default configuration.
    pub fn with_defaults(store: Arc<S>, cache: Arc<C>) -> Self {
        Self::new(store, cache, CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The underlying store, for callers that must bypass the cache.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    // ========================================================================
    // READ PATHS
    // ========================================================================

    /// Fetch one contact, serving from cache when possible.
    #[instrument(skip(self), fields(contact_id = %id))]
    pub async fn read(&self, id: ContactId) -> RolodexResult<Contact> {
        let key = CacheKey::Record(id);
        if let Some(bytes) = self.cache_get(&key).await? {
            match payload::decode_record(id, &bytes) {
                Ok(contact) => {
                    StatsCounters::bump(&self.stats.hits);
                    debug!("cache hit");
                    return Ok(contact);
                }
                Err(err) => self.discard_corrupt(&key, &err),
            }
        }

        StatsCounters::bump(&self.stats.misses);
        debug!("cache miss");
        let contact = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| RolodexError::not_found(id))?;
        self.cache_put(&key, payload::encode_record(&contact)?, WriteKind::Populate)
            .await?;
        Ok(contact)
    }

    /// Fetch every contact, serving from cache when possible.
    #[instrument(skip(self))]
    pub async fn read_all(&self) -> RolodexResult<Vec<Contact>> {
        let key = CacheKey::Collection;
        if let Some(bytes) = self.cache_get(&key).await? {
            match payload::decode_collection(&bytes) {
                Ok(contacts) => {
                    StatsCounters::bump(&self.stats.hits);
                    debug!(count = contacts.len(), "cache hit");
                    return Ok(contacts);
                }
                Err(err) => self.discard_corrupt(&key, &err),
            }
        }

        StatsCounters::bump(&self.stats.misses);
        debug!("cache miss");
        let contacts = self.store.find_all().await?;
        self.cache_put(
            &key,
            payload::encode_collection(&contacts)?,
            WriteKind::Populate,
        )
        .await?;
        Ok(contacts)
    }

    // ========================================================================
    // WRITE PATHS
    // ========================================================================

    /// Insert a contact and rewrite the collection entry from the store.
    ///
    /// Per-record entries are not touched. If the post-insert list fetch
    /// fails, the collection entry is dropped instead and the create still
    /// succeeds.
    #[instrument(skip(self, new))]
    pub async fn create(&self, new: NewContact) -> RolodexResult<Contact> {
        let new = new.validate()?;
        let created = self.store.insert(new).await?;
        debug!(contact_id = %created.id, "contact created");

        let key = CacheKey::Collection;
        match self.store.find_all().await {
            Ok(contacts) => {
                self.overwrite_or_invalidate(&key, payload::encode_collection(&contacts))
                    .await?;
            }
            Err(err) => {
                warn!(error = %err, "failed to refresh contact list after create, invalidating");
                self.cache_delete(&key).await?;
            }
        }
        Ok(created)
    }

    /// Patch a contact and overwrite its record entry with the fresh value.
    ///
    /// The collection entry is left alone unless the policy is
    /// [`CollectionPolicy::InvalidateOnUpdate`]. Once the store has applied
    /// the patch, a failed re-fetch drops the record entry and the update
    /// still succeeds.
    #[instrument(skip(self, patch), fields(contact_id = %id))]
    pub async fn update(&self, id: ContactId, patch: ContactPatch) -> RolodexResult<Contact> {
        let patch = patch.validate()?;
        let updated = self
            .store
            .update_by_id(id, &patch)
            .await?
            .ok_or_else(|| RolodexError::not_found(id))?;

        let key = CacheKey::Record(id);
        match self.store.find_by_id(id).await {
            Ok(Some(fresh)) => {
                self.overwrite_or_invalidate(&key, payload::encode_record(&fresh))
                    .await?;
            }
            Ok(None) => {
                // Deleted between the update and the re-fetch.
                self.cache_delete(&key).await?;
            }
            Err(err) => {
                warn!(error = %err, "failed to re-read contact after update, invalidating");
                self.cache_delete(&key).await?;
            }
        }

        if self.config.collection_policy == CollectionPolicy::InvalidateOnUpdate {
            self.cache_delete(&CacheKey::Collection).await?;
        }
        Ok(updated)
    }

    /// Remove a contact and purge it from both cache shapes.
    ///
    /// A missing id fails with `NotFound` and leaves the cache untouched, so
    /// the record entry is evicted before the collection is touched. Both
    /// cache steps always run; the first failure is returned.
    #[instrument(skip(self), fields(contact_id = %id))]
    pub async fn delete(&self, id: ContactId) -> RolodexResult<Contact> {
        let removed = self
            .store
            .delete_by_id(id)
            .await?
            .ok_or_else(|| RolodexError::not_found(id))?;

        let evicted = self.cache_delete(&CacheKey::Record(id)).await;
        let pruned = self.prune_collection(id).await;
        evicted.and(pruned)?;
        Ok(removed)
    }

    /// Filter `id` out of the cached collection, if one is cached.
    async fn prune_collection(&self, id: ContactId) -> RolodexResult<()> {
        let key = CacheKey::Collection;
        let Some(bytes) = self.cache_get(&key).await? else {
            return Ok(());
        };
        match payload::decode_collection(&bytes) {
            Ok(mut contacts) => {
                contacts.retain(|c| c.id != id);
                self.overwrite_or_invalidate(&key, payload::encode_collection(&contacts))
                    .await
            }
            Err(err) => {
                self.discard_corrupt(&key, &err);
                self.cache_delete(&key).await
            }
        }
    }

    // ========================================================================
    // HEALTH
    // ========================================================================

    /// Ping the store and the cache independently.
    pub async fn health(&self) -> (RolodexResult<()>, Result<(), CacheError>) {
        let store = self.store.health_check().await;
        let cache = self.cache.ping().await;
        (store, cache)
    }

    // ========================================================================
    // CACHE PRIMITIVES
    // ========================================================================

    fn render(&self, key: &CacheKey) -> String {
        key.render(self.config.namespace.as_deref())
    }

    /// Swallow transient cache failures when failing open; propagate the rest.
    fn degrade(&self, op: &'static str, key: &CacheKey, err: CacheError) -> RolodexResult<()> {
        if self.config.fail_open && err.is_unavailable() {
            StatsCounters::bump(&self.stats.degraded_ops);
            warn!(op, key = %key, error = %err, "cache unavailable, continuing without it");
            Ok(())
        } else {
            Err(err.into())
        }
    }

    fn discard_corrupt(&self, key: &CacheKey, err: &PayloadError) {
        StatsCounters::bump(&self.stats.corrupt_entries);
        warn!(key = %key, error = %err, "discarding cache entry that fails schema validation");
    }

    async fn cache_get(&self, key: &CacheKey) -> RolodexResult<Option<Vec<u8>>> {
        match self.cache.get(&self.render(key)).await {
            Ok(bytes) => Ok(bytes),
            Err(err) => self.degrade("get", key, err).map(|()| None),
        }
    }

    async fn cache_put(&self, key: &CacheKey, bytes: Vec<u8>, kind: WriteKind) -> RolodexResult<()> {
        let rendered = self.render(key);
        let result = match (kind, self.config.write_ttl) {
            (WriteKind::Overwrite, WriteTtl::Persist) => self.cache.set(&rendered, &bytes).await,
            _ => {
                self.cache
                    .set_with_ttl(&rendered, &bytes, self.config.entry_ttl)
                    .await
            }
        };
        match result {
            Ok(()) => {
                StatsCounters::bump(&self.stats.writes);
                Ok(())
            }
            Err(err) => self.degrade("set", key, err),
        }
    }

    async fn cache_delete(&self, key: &CacheKey) -> RolodexResult<()> {
        match self.cache.delete(&self.render(key)).await {
            Ok(()) => {
                StatsCounters::bump(&self.stats.invalidations);
                Ok(())
            }
            Err(err) => self.degrade("delete", key, err),
        }
    }

    /// Replace the entry at `key`. If encoding or the write fails, delete
    /// the entry instead so the previous snapshot is never left behind.
    async fn overwrite_or_invalidate(
        &self,
        key: &CacheKey,
        encoded: Result<Vec<u8>, CacheError>,
    ) -> RolodexResult<()> {
        let written = match encoded {
            Ok(bytes) => self.cache_put(key, bytes, WriteKind::Overwrite).await,
            Err(err) => Err(err.into()),
        };
        match written {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(key = %key, error = %err, "cache overwrite failed, invalidating");
                self.cache_delete(key).await
            }
        }
    }
}
