//! API Configuration Module
//!
//! Configuration for CORS, backend selection, and cache policy. Everything is
//! loaded from environment variables with sensible defaults for development.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rolodex_storage::{CacheConfig, CollectionPolicy, WriteTtl};

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for CORS.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    /// Example: "https://contacts.example.com,https://admin.example.com"
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            // CORS defaults: permissive for development
            cors_origins: Vec::new(), // Empty = allow all
            cors_allow_credentials: false,
            cors_max_age_secs: 86400, // 24 hours
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `ROLODEX_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `ROLODEX_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `ROLODEX_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    pub fn from_env() -> Self {
        let cors_origins = std::env::var("ROLODEX_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_allow_credentials = std::env::var("ROLODEX_CORS_ALLOW_CREDENTIALS")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        let cors_max_age_secs = std::env::var("ROLODEX_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(86400);

        Self {
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs,
        }
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }
}

// ============================================================================
// BACKEND SELECTION
// ============================================================================

/// Which authoritative store to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    #[default]
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(format!("unknown store kind: {}", other)),
        }
    }
}

impl StoreKind {
    /// Read `ROLODEX_STORE`; unknown values fall back to PostgreSQL.
    pub fn from_env() -> Self {
        std::env::var("ROLODEX_STORE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

/// Which cache backend to connect, with its connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackendConfig {
    Redis { url: String },
    Lmdb { path: PathBuf, max_size_mb: usize },
    Memory,
}

impl Default for CacheBackendConfig {
    fn default() -> Self {
        Self::Redis {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

impl CacheBackendConfig {
    /// Create a backend configuration from environment variables.
    ///
    /// Environment variables:
    /// - `ROLODEX_CACHE_BACKEND`: "redis" (default), "lmdb", or "memory"
    /// - `ROLODEX_REDIS_URL`: Redis connection URL (default: redis://127.0.0.1:6379)
    /// - `ROLODEX_LMDB_PATH`: LMDB directory (default: ./data/cache)
    /// - `ROLODEX_LMDB_MAX_SIZE_MB`: LMDB map size (default: 256)
    pub fn from_env() -> Self {
        let kind = std::env::var("ROLODEX_CACHE_BACKEND")
            .map(|s| s.trim().to_ascii_lowercase())
            .unwrap_or_else(|_| "redis".to_string());

        match kind.as_str() {
            "memory" => Self::Memory,
            "lmdb" => Self::Lmdb {
                path: std::env::var("ROLODEX_LMDB_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./data/cache")),
                max_size_mb: std::env::var("ROLODEX_LMDB_MAX_SIZE_MB")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(256),
            },
            _ => Self::Redis {
                url: std::env::var("ROLODEX_REDIS_URL")
                    .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            },
        }
    }

    /// Short backend name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Redis { .. } => "redis",
            Self::Lmdb { .. } => "lmdb",
            Self::Memory => "memory",
        }
    }
}

// ============================================================================
// CACHE POLICY
// ============================================================================

/// Build the cache layer policy from environment variables.
///
/// Environment variables:
/// - `ROLODEX_CACHE_TTL_SECS`: entry lifetime (default: 3600)
/// - `ROLODEX_CACHE_WRITE_TTL`: "reapply" (default) or "persist"
/// - `ROLODEX_CACHE_COLLECTION_POLICY`: "retain" (default) or "invalidate"
/// - `ROLODEX_CACHE_FAIL_OPEN`: "true" (default) or "false"
/// - `ROLODEX_CACHE_NAMESPACE`: optional key prefix
pub fn cache_config_from_env() -> CacheConfig {
    let mut config = CacheConfig::new();

    if let Some(secs) = std::env::var("ROLODEX_CACHE_TTL_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
    {
        config = config.with_ttl(Duration::from_secs(secs));
    }

    if let Some(mode) = std::env::var("ROLODEX_CACHE_WRITE_TTL")
        .ok()
        .and_then(|s| s.parse::<WriteTtl>().ok())
    {
        config = config.with_write_ttl(mode);
    }

    if let Some(policy) = std::env::var("ROLODEX_CACHE_COLLECTION_POLICY")
        .ok()
        .and_then(|s| s.parse::<CollectionPolicy>().ok())
    {
        config = config.with_collection_policy(policy);
    }

    let fail_open = std::env::var("ROLODEX_CACHE_FAIL_OPEN")
        .ok()
        .map(|s| s.to_lowercase() != "false")
        .unwrap_or(true);
    config = config.with_fail_open(fail_open);

    if let Some(namespace) = std::env::var("ROLODEX_CACHE_NAMESPACE")
        .ok()
        .filter(|s| !s.trim().is_empty())
    {
        config = config.with_namespace(namespace);
    }

    config
}
