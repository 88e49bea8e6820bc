//! Error types for Rolodex operations

use thiserror::Error;

use crate::ContactId;

/// Storage layer errors that are not part of the caller-facing contract.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Stored document is malformed: {reason}")]
    MalformedDocument { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Validation errors for incoming contact payloads.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Update must set at least one field")]
    EmptyPatch,
}

/// Master error type for all Rolodex errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RolodexError {
    #[error("Contact not found: {id}")]
    NotFound { id: ContactId },

    #[error("Duplicate value for {field}: {value}")]
    Conflict { field: String, value: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{component} unavailable: {reason}")]
    UpstreamUnavailable { component: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl RolodexError {
    pub fn not_found(id: ContactId) -> Self {
        Self::NotFound { id }
    }

    pub fn conflict(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Conflict {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn unavailable(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            component: component.into(),
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// True for failures a caller may reasonably retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }
}

/// Result type alias for Rolodex operations.
pub type RolodexResult<T> = Result<T, RolodexError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_not_found_display_includes_id() {
        let err = RolodexError::not_found(ContactId::new(Uuid::nil()));
        let msg = format!("{}", err);
        assert!(msg.contains("Contact not found"));
        assert!(msg.contains("00000000-0000-0000-0000-000000000000"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_conflict_display() {
        let err = RolodexError::conflict("email", "ada@example.com");
        let msg = format!("{}", err);
        assert!(msg.contains("email"));
        assert!(msg.contains("ada@example.com"));
        assert!(err.is_conflict());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_validation_converts_into_master() {
        let err: RolodexError = ValidationError::RequiredFieldMissing {
            field: "phone".to_string(),
        }
        .into();
        assert!(matches!(err, RolodexError::Validation(_)));
        assert!(format!("{}", err).contains("phone"));
    }

    #[test]
    fn test_unavailable_is_transient() {
        let err = RolodexError::unavailable("cache", "connection refused");
        assert!(err.is_transient());
        assert_eq!(format!("{}", err), "cache unavailable: connection refused");
    }

    #[test]
    fn test_storage_error_display_lock_poisoned() {
        let err: RolodexError = StorageError::LockPoisoned.into();
        assert!(format!("{}", err).contains("lock poisoned"));
    }
}
