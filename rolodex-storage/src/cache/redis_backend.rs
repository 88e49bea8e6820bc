//! Redis-backed cache implementation.
//!
//! Wraps a `redis` connection manager, which reconnects on its own after
//! transient drops. The handle is created with [`RedisCacheBackend::connect`]
//! and released with [`CacheBackend::disconnect`].

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};
use tokio::sync::RwLock;

use super::traits::{CacheBackend, CacheError};

/// Redis cache backend.
pub struct RedisCacheBackend {
    conn: RwLock<Option<ConnectionManager>>,
}

/// Connection-level failures are transient; everything else is a backend error.
fn classify(err: RedisError) -> CacheError {
    if err.is_io_error()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_timeout()
    {
        CacheError::unavailable(err.to_string())
    } else {
        CacheError::backend(err.to_string())
    }
}

impl RedisCacheBackend {
    /// Open a managed connection to `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(classify)?;
        let manager = ConnectionManager::new(client).await.map_err(classify)?;
        tracing::info!("Connected to Redis cache");
        Ok(Self {
            conn: RwLock::new(Some(manager)),
        })
    }

    /// The manager is cheap to clone; each call gets its own handle.
    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        self.conn
            .read()
            .await
            .clone()
            .ok_or_else(|| CacheError::unavailable("redis cache is disconnected"))
    }
}

/// Redis rejects `SET EX 0`; sub-second TTLs round up to one second.
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(classify)?;
        Ok(value)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = conn
            .set_ex(key, value, ttl_secs(ttl))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = conn.set(key, value).await.map_err(classify)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(key).await.map_err(classify)?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), CacheError> {
        if self.conn.write().await.take().is_some() {
            tracing::info!("Disconnected from Redis cache");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_rounds_up_to_whole_seconds() {
        assert_eq!(ttl_secs(Duration::from_secs(3600)), 3600);
        assert_eq!(ttl_secs(Duration::from_millis(1500)), 2);
        assert_eq!(ttl_secs(Duration::from_millis(1)), 1);
        assert_eq!(ttl_secs(Duration::ZERO), 1);
    }

    #[tokio::test]
    async fn test_bad_url_is_rejected() {
        assert!(RedisCacheBackend::connect("not a url").await.is_err());
    }

    #[cfg(feature = "redis-tests")]
    #[tokio::test]
    async fn test_round_trip_against_live_redis() -> Result<(), CacheError> {
        let url = std::env::var("ROLODEX_TEST_REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let cache = RedisCacheBackend::connect(&url).await?;
        let key = format!("rolodex-test:{}", uuid::Uuid::now_v7());

        cache.ping().await?;
        cache
            .set_with_ttl(&key, b"payload", Duration::from_secs(30))
            .await?;
        assert_eq!(cache.get(&key).await?, Some(b"payload".to_vec()));
        cache.delete(&key).await?;
        assert_eq!(cache.get(&key).await?, None);

        cache.disconnect().await?;
        assert!(cache.get(&key).await.unwrap_err().is_unavailable());
        Ok(())
    }
}
