//! REST API Routes Module
//!
//! Assembles the application router:
//! - `/` banner
//! - `/api/contacts` contact CRUD and export
//! - `/health` probes
//! - `/metrics` Prometheus scrape endpoint
//! - `/openapi.json` API document

pub mod contact;
pub mod health;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ApiConfig;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use contact::create_router as contact_router;
pub use health::create_router as health_router;

/// Plain-text body served at `/`.
pub const BANNER: &str = "Message from server";

async fn banner() -> &'static str {
    BANNER
}

/// Handler for /openapi.json endpoint.
#[cfg(feature = "openapi")]
async fn openapi_json() -> impl axum::response::IntoResponse {
    use utoipa::OpenApi;
    axum::Json(crate::openapi::ApiDoc::openapi())
}

/// Create the complete application router.
///
/// Layer order (outer to inner in execution):
/// 1. CORS - handles preflight requests
/// 2. Observability - span, metrics, completion log
/// 3. HTTP trace - tower-http request/response events
pub fn create_api_router(state: AppState, config: &ApiConfig) -> Router {
    let mut router = Router::new()
        .route("/", get(banner))
        .nest("/api/contacts", contact::create_router())
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler));

    #[cfg(feature = "openapi")]
    {
        router = router.route("/openapi.json", get(openapi_json));
    }

    router.with_state(state).layer(
        ServiceBuilder::new()
            .layer(build_cors_layer(config))
            .layer(from_fn(observability_middleware))
            .layer(TraceLayer::new_for_http()),
    )
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if !config.is_production() {
        // Development mode: allow all origins
        tracing::info!("CORS: Development mode - allowing all origins");
        return cors.allow_origin(Any).allow_headers(Any);
    }

    tracing::info!(
        "CORS: Production mode - allowing origins: {:?}",
        config.cors_origins
    );
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    let cors = cors
        .allow_origin(origins)
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);
    if config.cors_allow_credentials {
        cors.allow_credentials(true)
    } else {
        cors
    }
}
