//! LMDB-backed cache implementation.
//!
//! Uses the heed crate (Rust bindings for LMDB) for an embedded,
//! memory-mapped cache that needs no separate server and keeps its entries
//! across process restarts.
//!
//! # Value Format
//!
//! `[expires_at: 8 bytes, i64 LE unix millis, 0 = never][payload]`
//!
//! LMDB has no native expiry, so expired entries are filtered on read and
//! removed lazily.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use super::traits::{CacheBackend, CacheError};

/// Error type for opening an LMDB cache.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for CacheError {
    fn from(e: LmdbCacheError) -> Self {
        CacheError::backend(e.to_string())
    }
}

const HEADER_LEN: usize = 8;
const NO_EXPIRY: i64 = 0;

fn encode_entry(value: &[u8], expires_at_ms: i64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + value.len());
    bytes.extend_from_slice(&expires_at_ms.to_le_bytes());
    bytes.extend_from_slice(value);
    bytes
}

/// Split an envelope into expiry and payload. `None` for truncated entries.
fn decode_entry(bytes: &[u8]) -> Option<(i64, &[u8])> {
    if bytes.len() < HEADER_LEN {
        return None;
    }
    let header: [u8; HEADER_LEN] = bytes[..HEADER_LEN].try_into().ok()?;
    Some((i64::from_le_bytes(header), &bytes[HEADER_LEN..]))
}

fn is_expired(expires_at_ms: i64, now_ms: i64) -> bool {
    expires_at_ms != NO_EXPIRY && now_ms >= expires_at_ms
}

/// LMDB-backed cache.
///
/// # Example
///
/// ```ignore
/// use rolodex_storage::cache::{CacheBackend, LmdbCacheBackend};
///
/// let backend = LmdbCacheBackend::new("/tmp/rolodex-cache", 100)?;
/// backend.set_with_ttl("allContacts", b"[]", Duration::from_secs(3600)).await?;
/// ```
pub struct LmdbCacheBackend {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
    closed: AtomicBool,
}

impl LmdbCacheBackend {
    /// Create a new LMDB cache backend.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        let map_size = max_size_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| {
                LmdbCacheError::EnvOpen(format!("map size of {} MB overflows", max_size_mb))
            })?;
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per path by this process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            db,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), CacheError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(CacheError::unavailable("lmdb cache is closed"))
        } else {
            Ok(())
        }
    }

    fn put(&self, key: &str, value: &[u8], expires_at_ms: i64) -> Result<(), CacheError> {
        self.ensure_open()?;
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        self.db
            .put(&mut wtxn, key.as_bytes(), &encode_entry(value, expires_at_ms))
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        self.db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for LmdbCacheBackend {
    fn name(&self) -> &'static str {
        "lmdb"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.ensure_open()?;
        {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
            let Some(bytes) = self
                .db
                .get(&rtxn, key.as_bytes())
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?
            else {
                return Ok(None);
            };
            if let Some((expires_at, payload)) = decode_entry(bytes) {
                if !is_expired(expires_at, Utc::now().timestamp_millis()) {
                    return Ok(Some(payload.to_vec()));
                }
            }
        }
        // Expired or truncated.
        self.remove(key)?;
        Ok(None)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp_millis().saturating_add(ttl_ms.max(1));
        self.put(key, value, expires_at)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        self.put(key, value, NO_EXPIRY)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.ensure_open()?;
        self.remove(key)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.ensure_open()?;
        self.env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), CacheError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
