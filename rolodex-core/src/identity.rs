//! Identity types for Rolodex entities

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Contact identifier.
///
/// Backed by a UUIDv7 so identifiers sort by creation time. The id is
/// assigned by the store on insert; callers never mint their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
#[serde(transparent)]
pub struct ContactId(Uuid);

impl ContactId {
    /// Wrap an existing UUID.
    pub const fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a fresh timestamp-sortable id.
    pub fn now_v7() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for ContactId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for ContactId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ContactId> for Uuid {
    fn from(id: ContactId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_hyphenated_lowercase() {
        let uuid = Uuid::parse_str("0190F2A1-7B3C-7D4E-8F00-112233445566").expect("valid uuid");
        let id = ContactId::new(uuid);
        assert_eq!(id.to_string(), "0190f2a1-7b3c-7d4e-8f00-112233445566");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("not-an-id".parse::<ContactId>().is_err());
    }

    #[test]
    fn test_now_v7_is_version_seven() {
        let id = ContactId::now_v7();
        assert_eq!(id.as_uuid().get_version_num(), 7);
    }

    #[test]
    fn test_serde_is_transparent() -> Result<(), serde_json::Error> {
        let id = ContactId::now_v7();
        let json = serde_json::to_string(&id)?;
        assert_eq!(json, format!("\"{}\"", id));
        let back: ContactId = serde_json::from_str(&json)?;
        assert_eq!(back, id);
        Ok(())
    }
}
