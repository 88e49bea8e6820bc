//! Typed payload schemas for cache entries.
//!
//! Record entries hold one JSON contact; collection entries hold a JSON array
//! of contacts. Decoding is strict: anything that does not match the schema
//! for its key shape is rejected, and callers treat it as a miss.

use rolodex_core::{Contact, ContactId};
use thiserror::Error;

use super::traits::CacheError;

/// Why a cached payload was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload does not match schema: {0}")]
    Malformed(String),

    #[error("record payload carries id {found}, expected {expected}")]
    IdMismatch {
        expected: ContactId,
        found: ContactId,
    },
}

pub fn encode_record(contact: &Contact) -> Result<Vec<u8>, CacheError> {
    serde_json::to_vec(contact).map_err(|e| CacheError::Serialization {
        reason: e.to_string(),
    })
}

pub fn encode_collection(contacts: &[Contact]) -> Result<Vec<u8>, CacheError> {
    serde_json::to_vec(contacts).map_err(|e| CacheError::Serialization {
        reason: e.to_string(),
    })
}

/// Decode a record entry stored under the key for `expected`.
pub fn decode_record(expected: ContactId, bytes: &[u8]) -> Result<Contact, PayloadError> {
    let contact: Contact =
        serde_json::from_slice(bytes).map_err(|e| PayloadError::Malformed(e.to_string()))?;
    if contact.id != expected {
        return Err(PayloadError::IdMismatch {
            expected,
            found: contact.id,
        });
    }
    Ok(contact)
}

pub fn decode_collection(bytes: &[u8]) -> Result<Vec<Contact>, PayloadError> {
    serde_json::from_slice(bytes).map_err(|e| PayloadError::Malformed(e.to_string()))
}
