//! Rolodex API - REST layer for the contact service
//!
//! Exposes contact CRUD over Axum. Every request goes through the
//! read-through / write-invalidate cache layer in `rolodex-storage`, with
//! PostgreSQL as the authoritative store.

pub mod config;
pub mod db;
pub mod error;
pub mod macros;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{cache_config_from_env, ApiConfig, CacheBackendConfig, StoreKind};
pub use db::{DbConfig, PgContactStore};
pub use error::{ApiError, ApiResult, ErrorCode};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::{AppState, ContactLayer};
