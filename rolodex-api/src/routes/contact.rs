//! Contact REST API Routes
//!
//! Axum handlers for contact CRUD and CSV export. Every read and write goes
//! through the cache-consistency layer; export reads the store directly.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use rolodex_core::{Contact, ContactId, ContactPatch, NewContact};
use rolodex_storage::ContactStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    state::{AppState, ContactLayer},
};

// ============================================================================
// RESPONSE TYPES
// ============================================================================

/// Body of `GET /api/contacts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ContactListResponse {
    #[serde(rename = "allContacts")]
    pub all_contacts: Vec<Contact>,
}

/// Body of `GET /api/contacts/:id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ContactResponse {
    pub contact: Contact,
}

/// Body of the create, update, and delete endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ContactMessageResponse {
    pub message: String,
    pub contact: Contact,
}

impl ContactMessageResponse {
    fn new(message: &str, contact: Contact) -> Self {
        Self {
            message: message.to_string(),
            contact,
        }
    }
}

pub const EXPORT_HEADERS: [&str; 3] = ["Name", "Email", "Contact Number"];
pub const EXPORT_FILENAME: &str = "contacts.csv";

fn parse_id(raw: &str) -> ApiResult<ContactId> {
    Ok(raw.parse::<ContactId>()?)
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/contacts - List all contacts
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/contacts",
    tag = "Contacts",
    responses(
        (status = 200, description = "All contacts", body = ContactListResponse),
        (status = 503, description = "Store unavailable", body = ApiError),
    ),
))]
pub async fn list_contacts(
    State(contacts): State<Arc<ContactLayer>>,
) -> ApiResult<impl IntoResponse> {
    let all_contacts = contacts.read_all().await?;
    Ok(Json(ContactListResponse { all_contacts }))
}

/// GET /api/contacts/:id - Fetch one contact
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/contacts/{id}",
    tag = "Contacts",
    params(("id" = String, Path, description = "Contact id (UUID)")),
    responses(
        (status = 200, description = "Contact found", body = ContactResponse),
        (status = 400, description = "Malformed id", body = ApiError),
        (status = 404, description = "Contact not found", body = ApiError),
    ),
))]
pub async fn get_contact(
    State(contacts): State<Arc<ContactLayer>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id)?;
    let contact = contacts.read(id).await?;
    Ok(Json(ContactResponse { contact }))
}

/// POST /api/contacts - Create a contact
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/contacts",
    tag = "Contacts",
    request_body = NewContact,
    responses(
        (status = 201, description = "Contact created", body = ContactMessageResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 409, description = "Email or phone already in use", body = ApiError),
    ),
))]
pub async fn create_contact(
    State(contacts): State<Arc<ContactLayer>>,
    payload: Result<Json<NewContact>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(new) = payload?;
    let contact = contacts.create(new).await?;
    tracing::info!(contact_id = %contact.id, "Contact created");

    Ok((
        StatusCode::CREATED,
        Json(ContactMessageResponse::new("Contact Created", contact)),
    ))
}

/// PUT /api/contacts/:id - Update a contact
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/api/contacts/{id}",
    tag = "Contacts",
    params(("id" = String, Path, description = "Contact id (UUID)")),
    request_body = ContactPatch,
    responses(
        (status = 200, description = "Contact updated", body = ContactMessageResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Contact not found", body = ApiError),
        (status = 409, description = "Email or phone already in use", body = ApiError),
    ),
))]
pub async fn update_contact(
    State(contacts): State<Arc<ContactLayer>>,
    Path(id): Path<String>,
    payload: Result<Json<ContactPatch>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id)?;
    let Json(patch) = payload?;
    let contact = contacts.update(id, patch).await?;
    tracing::info!(contact_id = %id, "Contact updated");

    Ok(Json(ContactMessageResponse::new("Contact Updated", contact)))
}

/// DELETE /api/contacts/:id - Delete a contact
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/api/contacts/{id}",
    tag = "Contacts",
    params(("id" = String, Path, description = "Contact id (UUID)")),
    responses(
        (status = 200, description = "Contact deleted", body = ContactMessageResponse),
        (status = 400, description = "Malformed id", body = ApiError),
        (status = 404, description = "Contact not found", body = ApiError),
    ),
))]
pub async fn delete_contact(
    State(contacts): State<Arc<ContactLayer>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id)?;
    let contact = contacts.delete(id).await?;
    tracing::info!(contact_id = %id, "Contact deleted");

    Ok(Json(ContactMessageResponse::new("Contact Deleted", contact)))
}

/// GET /api/contacts/export - Download all contacts as CSV
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/contacts/export",
    tag = "Contacts",
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv"),
        (status = 404, description = "No contacts to export", body = ApiError),
    ),
))]
pub async fn export_contacts(
    State(contacts): State<Arc<ContactLayer>>,
) -> ApiResult<impl IntoResponse> {
    let all = contacts.store().find_all().await?;
    if all.is_empty() {
        return Err(ApiError::not_found("No contacts found"));
    }

    let body = render_csv(&all)?;
    tracing::info!(rows = all.len(), "Contacts exported");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILENAME),
            ),
        ],
        body,
    ))
}

/// Serialize contacts as CSV with a header row.
pub fn render_csv(contacts: &[Contact]) -> ApiResult<Vec<u8>> {
    let csv_error = |e: csv::Error| ApiError::internal_error(format!("Failed to write CSV: {}", e));

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADERS).map_err(csv_error)?;
    for contact in contacts {
        writer
            .write_record([&contact.name, &contact.email, &contact.phone])
            .map_err(csv_error)?;
    }
    writer
        .into_inner()
        .map_err(|e| ApiError::internal_error(format!("Failed to flush CSV: {}", e)))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the contact router, mounted under `/api/contacts`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_contacts).post(create_contact))
        .route("/export", get(export_contacts))
        .route(
            "/:id",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
}
