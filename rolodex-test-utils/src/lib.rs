//! Rolodex Test Utilities
//!
//! Centralized test infrastructure for the Rolodex workspace:
//! - Instrumented store and cache doubles
//! - Proptest generators for contact types
//! - Test fixtures for common scenarios
//! - Assertions on the error taxonomy

// Re-export in-memory implementations from their source crate
pub use rolodex_storage::{InMemoryCacheBackend, InMemoryContactStore};

// Re-export core types for convenience
pub use rolodex_core::{
    Contact, ContactId, ContactPatch, NewContact, RolodexError, RolodexResult, Timestamp,
    ValidationError,
};

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rolodex_storage::{CacheBackend, CacheError, ContactStore};

// ============================================================================
// COUNTING STORE
// ============================================================================

/// Store wrapper that counts calls and can slow down reads.
///
/// The read delay makes concurrent cache misses overlap deterministically
/// under a paused Tokio clock.
#[derive(Debug, Default)]
pub struct CountingStore<S = InMemoryContactStore> {
    inner: S,
    read_delay: Option<Duration>,
    find_by_id_calls: AtomicUsize,
    find_all_calls: AtomicUsize,
    insert_calls: AtomicUsize,
    update_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    fail_next_find_by_id: AtomicBool,
}

impl CountingStore<InMemoryContactStore> {
    pub fn new() -> Self {
        Self::wrap(InMemoryContactStore::new())
    }
}

impl<S> CountingStore<S> {
    pub fn wrap(inner: S) -> Self {
        Self {
            inner,
            read_delay: None,
            find_by_id_calls: AtomicUsize::new(0),
            find_all_calls: AtomicUsize::new(0),
            insert_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            fail_next_find_by_id: AtomicBool::new(false),
        }
    }

    /// Sleep for `delay` before every `find_by_id` / `find_all`.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Make the next `find_by_id` fail with an upstream outage.
    pub fn fail_next_find_by_id(&self) {
        self.fail_next_find_by_id.store(true, Ordering::SeqCst);
    }

    pub fn find_by_id_calls(&self) -> usize {
        self.find_by_id_calls.load(Ordering::SeqCst)
    }

    pub fn find_all_calls(&self) -> usize {
        self.find_all_calls.load(Ordering::SeqCst)
    }

    /// Total read calls (`find_by_id` + `find_all`).
    pub fn reads(&self) -> usize {
        self.find_by_id_calls() + self.find_all_calls()
    }

    /// Total mutating calls.
    pub fn writes(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
            + self.update_calls.load(Ordering::SeqCst)
            + self.delete_calls.load(Ordering::SeqCst)
    }

    /// Zero every counter.
    pub fn reset_counts(&self) {
        for counter in [
            &self.find_by_id_calls,
            &self.find_all_calls,
            &self.insert_calls,
            &self.update_calls,
            &self.delete_calls,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }

    async fn delay(&self) {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl<S: ContactStore> ContactStore for CountingStore<S> {
    async fn find_by_id(&self, id: ContactId) -> RolodexResult<Option<Contact>> {
        self.find_by_id_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        if self.fail_next_find_by_id.swap(false, Ordering::SeqCst) {
            return Err(RolodexError::unavailable("store", "injected blip"));
        }
        self.inner.find_by_id(id).await
    }

    async fn find_all(&self) -> RolodexResult<Vec<Contact>> {
        self.find_all_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.inner.find_all().await
    }

    async fn insert(&self, new: NewContact) -> RolodexResult<Contact> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(new).await
    }

    async fn update_by_id(
        &self,
        id: ContactId,
        patch: &ContactPatch,
    ) -> RolodexResult<Option<Contact>> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.update_by_id(id, patch).await
    }

    async fn delete_by_id(&self, id: ContactId) -> RolodexResult<Option<Contact>> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_by_id(id).await
    }

    async fn health_check(&self) -> RolodexResult<()> {
        self.inner.health_check().await
    }
}

// ============================================================================
// FLAKY CACHE
// ============================================================================

/// Failure mode of a [`FlakyCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Healthy,
    /// Every call fails with [`CacheError::Unavailable`].
    Unavailable,
    /// Every call fails with [`CacheError::Backend`].
    Failing,
    /// Writes fail with [`CacheError::Backend`] while reads and deletes
    /// succeed, like a full Redis under `noeviction`.
    RejectWrites,
}

impl CacheMode {
    fn to_u8(self) -> u8 {
        match self {
            CacheMode::Healthy => 0,
            CacheMode::Unavailable => 1,
            CacheMode::Failing => 2,
            CacheMode::RejectWrites => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => CacheMode::Unavailable,
            2 => CacheMode::Failing,
            3 => CacheMode::RejectWrites,
            _ => CacheMode::Healthy,
        }
    }
}

/// A mutating cache call that reached the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheWrite {
    SetWithTtl { key: String, ttl: Duration },
    Set { key: String },
    Delete { key: String },
}

impl CacheWrite {
    pub fn key(&self) -> &str {
        match self {
            CacheWrite::SetWithTtl { key, .. }
            | CacheWrite::Set { key }
            | CacheWrite::Delete { key } => key,
        }
    }
}

/// Cache wrapper with switchable failure modes and a log of writes.
#[derive(Debug)]
pub struct FlakyCache<C = InMemoryCacheBackend> {
    inner: C,
    mode: AtomicU8,
    gets: AtomicUsize,
    writes: Mutex<Vec<CacheWrite>>,
}

impl Default for FlakyCache<InMemoryCacheBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl FlakyCache<InMemoryCacheBackend> {
    pub fn new() -> Self {
        Self::wrap(InMemoryCacheBackend::new())
    }
}

impl<C> FlakyCache<C> {
    pub fn wrap(inner: C) -> Self {
        Self {
            inner,
            mode: AtomicU8::new(CacheMode::Healthy.to_u8()),
            gets: AtomicUsize::new(0),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn set_mode(&self, mode: CacheMode) {
        self.mode.store(mode.to_u8(), Ordering::SeqCst);
    }

    pub fn mode(&self) -> CacheMode {
        CacheMode::from_u8(self.mode.load(Ordering::SeqCst))
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Every successful mutating call, oldest first.
    pub fn write_log(&self) -> Vec<CacheWrite> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn clear_write_log(&self) {
        if let Ok(mut writes) = self.writes.lock() {
            writes.clear();
        }
    }

    fn check(&self) -> Result<(), CacheError> {
        match self.mode() {
            CacheMode::Healthy | CacheMode::RejectWrites => Ok(()),
            CacheMode::Unavailable => Err(CacheError::unavailable("injected outage")),
            CacheMode::Failing => Err(CacheError::backend("injected failure")),
        }
    }

    fn check_write(&self) -> Result<(), CacheError> {
        match self.mode() {
            CacheMode::RejectWrites => Err(CacheError::backend("OOM command not allowed")),
            _ => self.check(),
        }
    }

    fn log(&self, write: CacheWrite) {
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(write);
        }
    }
}

#[async_trait]
impl<C: CacheBackend> CacheBackend for FlakyCache<C> {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get(key).await
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.check_write()?;
        self.inner.set_with_ttl(key, value, ttl).await?;
        self.log(CacheWrite::SetWithTtl {
            key: key.to_string(),
            ttl,
        });
        Ok(())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        self.check_write()?;
        self.inner.set(key, value).await?;
        self.log(CacheWrite::Set {
            key: key.to_string(),
        });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.check()?;
        self.inner.delete(key).await?;
        self.log(CacheWrite::Delete {
            key: key.to_string(),
        });
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.check()?;
        self.inner.ping().await
    }

    async fn disconnect(&self) -> Result<(), CacheError> {
        self.inner.disconnect().await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating Rolodex types.

    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Generate a random ContactId.
    pub fn arb_contact_id() -> impl Strategy<Value = ContactId> {
        any::<[u8; 16]>().prop_map(|b| ContactId::new(Uuid::from_bytes(b)))
    }

    /// Generate a timestamp between 2000 and 2100.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (946_684_800i64..4_102_444_800i64)
            .prop_map(|secs| Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now))
    }

    pub fn arb_name() -> impl Strategy<Value = String> {
        "[A-Z][a-z]{1,12}( [A-Z][a-z]{1,12})?"
    }

    /// Generate a payload whose email and phone embed `seed`, so payloads
    /// built from distinct seeds never collide on uniqueness.
    pub fn arb_new_contact_seeded(seed: usize) -> impl Strategy<Value = NewContact> {
        (arb_name(), "[a-z]{1,8}", "[0-9]{3}").prop_map(move |(name, user, area)| {
            NewContact::new(
                name,
                format!("{}.{}@example.com", user, seed),
                format!("{}-{:06}", area, seed),
            )
        })
    }

    /// Generate `1..=max` payloads with pairwise-distinct unique fields.
    pub fn arb_new_contacts(max: usize) -> impl Strategy<Value = Vec<NewContact>> {
        (1..=max.max(1)).prop_flat_map(|n| {
            (0..n)
                .map(arb_new_contact_seeded)
                .collect::<Vec<_>>()
        })
    }

    /// Generate a non-empty patch.
    pub fn arb_contact_patch() -> impl Strategy<Value = ContactPatch> {
        (
            prop::option::of(arb_name()),
            prop::option::of("[a-z]{1,8}@patched\\.example\\.com"),
            prop::option::of("9[0-9]{2}-[0-9]{6}"),
        )
            .prop_filter("patch must set a field", |(n, e, p)| {
                n.is_some() || e.is_some() || p.is_some()
            })
            .prop_map(|(name, email, phone)| ContactPatch { name, email, phone })
    }

    /// Generate a stored contact.
    pub fn arb_contact() -> impl Strategy<Value = Contact> {
        (
            arb_contact_id(),
            arb_new_contact_seeded(0),
            arb_timestamp(),
        )
            .prop_map(|(id, new, at)| Contact::from_new(id, new, at))
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use rolodex_storage::{CacheConfig, CachedContactStore};

    pub fn ada() -> NewContact {
        NewContact::new("Ada Lovelace", "ada@example.com", "555-0100")
    }

    pub fn grace() -> NewContact {
        NewContact::new("Grace Hopper", "grace@example.com", "555-0101")
    }

    pub fn linus() -> NewContact {
        NewContact::new("Linus Torvalds", "linus@example.com", "555-0102")
    }

    /// Layer over instrumented doubles, with handles to both.
    pub struct Harness {
        pub store: Arc<CountingStore>,
        pub cache: Arc<FlakyCache>,
        pub layer: CachedContactStore<CountingStore, FlakyCache>,
    }

    impl Harness {
        pub fn new(config: CacheConfig) -> Self {
            Self::with_store(CountingStore::new(), config)
        }

        pub fn with_store(store: CountingStore, config: CacheConfig) -> Self {
            let store = Arc::new(store);
            let cache = Arc::new(FlakyCache::new());
            let layer = CachedContactStore::new(store.clone(), cache.clone(), config);
            Self {
                store,
                cache,
                layer,
            }
        }

        /// Create `new` records through the layer, then clear all counters.
        pub async fn seeded(
            config: CacheConfig,
            new: Vec<NewContact>,
        ) -> RolodexResult<(Self, Vec<Contact>)> {
            let harness = Self::new(config);
            let mut created = Vec::with_capacity(new.len());
            for contact in new {
                created.push(harness.layer.create(contact).await?);
            }
            harness.reset();
            Ok((harness, created))
        }

        pub fn reset(&self) {
            self.store.reset_counts();
            self.cache.clear_write_log();
        }

        /// Raw bytes currently cached under `key`, bypassing failure modes.
        pub async fn raw(&self, key: &str) -> Option<Vec<u8>> {
            self.cache.inner().get(key).await.ok().flatten()
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on the Rolodex error taxonomy.

    use super::*;

    /// Assert that a result is a NotFound for `id`.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &RolodexResult<T>, id: ContactId) {
        match result {
            Err(RolodexError::NotFound { id: got }) if *got == id => {}
            other => panic!("Expected NotFound for {}, got: {:?}", id, other),
        }
    }

    /// Assert that a result is a Conflict on `field`.
    #[track_caller]
    pub fn assert_conflict<T: std::fmt::Debug>(result: &RolodexResult<T>, field: &str) {
        match result {
            Err(RolodexError::Conflict { field: got, .. }) if got == field => {}
            other => panic!("Expected Conflict on {}, got: {:?}", field, other),
        }
    }

    /// Assert that a result is a validation failure.
    #[track_caller]
    pub fn assert_validation<T: std::fmt::Debug>(result: &RolodexResult<T>) {
        match result {
            Err(RolodexError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }
}
