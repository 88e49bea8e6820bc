//! In-process cache backend.
//!
//! Expiry follows the Tokio clock, so tests can pause and advance time.
//! Expired entries are dropped when their key is read and swept on every
//! write.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::traits::{CacheBackend, CacheError};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Remaining lifetime of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Never,
    In(Duration),
}

/// Cache backend holding entries in a map.
#[derive(Debug)]
pub struct InMemoryCacheBackend {
    entries: RwLock<HashMap<String, Entry>>,
    connected: AtomicBool,
}

impl Default for InMemoryCacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            connected: AtomicBool::new(true),
        }
    }

    /// Re-enable a disconnected backend. Entries survive the outage.
    pub fn reconnect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Expiry of a live entry, or `None` if the key is absent or expired.
    pub async fn expiry(&self, key: &str) -> Option<Expiry> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        let entry = entries.get(key).filter(|e| e.is_live(now))?;
        Some(match entry.expires_at {
            None => Expiry::Never,
            Some(at) => Expiry::In(at.saturating_duration_since(now)),
        })
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn ensure_connected(&self) -> Result<(), CacheError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(CacheError::unavailable("in-memory cache is disconnected"))
        }
    }

    /// Store an entry, sweeping every expired one first so keys that are
    /// never read again do not accumulate.
    async fn insert(&self, key: &str, value: &[u8], expires_at: Option<Instant>) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.is_live(now));
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at,
            },
        );
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.ensure_connected()?;
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.ensure_connected()?;
        self.insert(key, value, Some(Instant::now() + ttl)).await;
        Ok(())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        self.ensure_connected()?;
        self.insert(key, value, None).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.ensure_connected()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.ensure_connected()
    }

    async fn disconnect(&self) -> Result<(), CacheError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
