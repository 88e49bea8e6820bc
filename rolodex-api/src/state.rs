//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use rolodex_storage::{CacheBackend, CacheConfig, CachedContactStore, ContactStore};

/// The cache-consistency layer as the API sees it: any store behind any
/// cache backend.
pub type ContactLayer = CachedContactStore<dyn ContactStore, dyn CacheBackend>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Every contact operation goes through this layer.
    pub contacts: Arc<ContactLayer>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(contacts: Arc<ContactLayer>) -> Self {
        Self {
            contacts,
            start_time: Instant::now(),
        }
    }

    /// Assemble the layer from a store and a connected cache backend.
    pub fn from_parts(
        store: Arc<dyn ContactStore>,
        cache: Arc<dyn CacheBackend>,
        config: CacheConfig,
    ) -> Self {
        Self::new(Arc::new(CachedContactStore::new(store, cache, config)))
    }
}

crate::impl_from_ref!(Arc<ContactLayer>, contacts);
