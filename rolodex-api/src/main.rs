//! Rolodex API Server Entry Point
//!
//! Bootstraps configuration, connects the store and the cache, and starts
//! the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use rolodex_api::{
    cache_config_from_env, create_api_router, ApiConfig, ApiError, ApiResult, AppState,
    CacheBackendConfig, DbConfig, PgContactStore, StoreKind,
};
use rolodex_core::RolodexError;
use rolodex_storage::{
    CacheBackend, CacheError, ContactStore, InMemoryCacheBackend, InMemoryContactStore,
    LmdbCacheBackend, RedisCacheBackend,
};

use rolodex_api::telemetry::{init_tracing, TelemetryConfig};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let store = connect_store(StoreKind::from_env()).await?;
    let cache = connect_cache(&CacheBackendConfig::from_env()).await?;
    let cache_config = cache_config_from_env();
    tracing::info!(?cache_config, backend = cache.name(), "Cache layer configured");

    let api_config = ApiConfig::from_env();
    let state = AppState::from_parts(store, cache.clone(), cache_config);
    let app: Router = create_api_router(state, &api_config);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting Rolodex API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    if let Err(e) = cache.disconnect().await {
        tracing::warn!(error = %e, "Cache disconnect failed");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn connect_store(kind: StoreKind) -> ApiResult<Arc<dyn ContactStore>> {
    match kind {
        StoreKind::Postgres => {
            let store = PgContactStore::from_config(&DbConfig::from_env())?;
            store.migrate().await?;
            tracing::info!("Using PostgreSQL contact store");
            Ok(Arc::new(store))
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory contact store; data is lost on restart");
            Ok(Arc::new(InMemoryContactStore::new()))
        }
    }
}

async fn connect_cache(config: &CacheBackendConfig) -> ApiResult<Arc<dyn CacheBackend>> {
    let cache_error = |e: CacheError| ApiError::from(RolodexError::from(e));

    let cache: Arc<dyn CacheBackend> = match config {
        CacheBackendConfig::Redis { url } => {
            Arc::new(RedisCacheBackend::connect(url).await.map_err(cache_error)?)
        }
        CacheBackendConfig::Lmdb { path, max_size_mb } => Arc::new(
            LmdbCacheBackend::new(path, *max_size_mb)
                .map_err(|e| cache_error(CacheError::from(e)))?,
        ),
        CacheBackendConfig::Memory => Arc::new(InMemoryCacheBackend::new()),
    };
    tracing::info!(backend = config.name(), "Cache backend connected");
    Ok(cache)
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("ROLODEX_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("ROLODEX_API_PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
