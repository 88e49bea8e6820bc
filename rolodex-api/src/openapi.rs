//! OpenAPI Specification for the Rolodex API
//!
//! Generated with utoipa from the route annotations and schema derives.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::contact::{ContactListResponse, ContactMessageResponse, ContactResponse};
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::{contact, health};
use crate::telemetry::metrics;

use rolodex_core::{Contact, ContactId, ContactPatch, NewContact};

/// OpenAPI document for the Rolodex API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rolodex API",
        version = "0.1.0",
        description = "Contact list service with a read-through cache",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Contacts", description = "Contact CRUD and CSV export"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        // === Contact Routes ===
        contact::list_contacts,
        contact::get_contact,
        contact::create_contact,
        contact::update_contact,
        contact::delete_contact,
        contact::export_contacts,

        // === Health Routes ===
        health::ping,
        health::liveness,
        health::readiness,

        // === Observability ===
        metrics::metrics_handler,
    ),
    components(
        schemas(
            // === Error Types ===
            ApiError, ErrorCode,

            // === Contact Types ===
            Contact, ContactId, NewContact, ContactPatch,
            ContactListResponse, ContactResponse, ContactMessageResponse,

            // === Health Types ===
            HealthResponse, HealthStatus, HealthDetails, ComponentHealth,
        )
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        let openapi = Self::openapi();
        serde_json::to_string_pretty(&openapi)
    }
}
