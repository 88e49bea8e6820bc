//! Contact entity and request payloads.
//!
//! Field names on the wire follow the document layout the service has always
//! exposed (`_id`, `ContactName`, `createdAt`, `updatedAt`), so cached
//! snapshots and API bodies stay interchangeable with existing clients.

use serde::{Deserialize, Serialize};

use crate::{ContactId, Timestamp, ValidationError};

/// A stored contact record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Contact {
    #[serde(rename = "_id")]
    pub id: ContactId,
    #[serde(rename = "ContactName")]
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(rename = "createdAt")]
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[serde(rename = "updatedAt")]
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl Contact {
    /// Build a record from a validated payload, as a store does on insert.
    pub fn from_new(id: ContactId, new: NewContact, now: Timestamp) -> Self {
        Self {
            id,
            name: new.name,
            email: new.email,
            phone: new.phone,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a validated patch in place and bump `updated_at`.
    pub fn apply(&mut self, patch: &ContactPatch, now: Timestamp) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(email) = &patch.email {
            self.email = email.clone();
        }
        if let Some(phone) = &patch.phone {
            self.phone = phone.clone();
        }
        self.updated_at = now;
    }
}

/// Payload for creating a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewContact {
    #[serde(rename = "ContactName", default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

impl NewContact {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
        }
    }

    /// Check required fields and return a trimmed copy.
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            name: required("ContactName", &self.name)?,
            email: required("email", &self.email)?,
            phone: required("phone", &self.phone)?,
        })
    }
}

/// Partial update for a contact. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ContactPatch {
    #[serde(rename = "ContactName", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ContactPatch {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none()
    }

    /// Reject empty patches and blank values; return a trimmed copy.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyPatch);
        }
        Ok(Self {
            name: self.name.as_deref().map(|v| non_blank("ContactName", v)).transpose()?,
            email: self.email.as_deref().map(|v| non_blank("email", v)).transpose()?,
            phone: self.phone.as_deref().map(|v| non_blank("phone", v)).transpose()?,
        })
    }
}

fn required(field: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn non_blank(field: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: "must not be blank".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

// =============================================================================
// TESTS
// =============================================================================
