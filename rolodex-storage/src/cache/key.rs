//! Cache key naming.
//!
//! Two key shapes exist: one fixed key for the full collection and one key
//! per record. Rendered names match the keys the service has always written
//! (`allContacts`, `contact:<id>`), optionally under a namespace prefix.

use std::fmt;

use rolodex_core::ContactId;

/// Key of the full-collection entry.
pub const COLLECTION_KEY: &str = "allContacts";

/// Prefix of per-record entries.
pub const RECORD_KEY_PREFIX: &str = "contact:";

/// A typed cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Snapshot of every contact.
    Collection,
    /// Snapshot of a single contact.
    Record(ContactId),
}

impl CacheKey {
    /// Render the backend key, prefixed with `namespace:` when one is set.
    pub fn render(&self, namespace: Option<&str>) -> String {
        match namespace {
            Some(ns) if !ns.is_empty() => format!("{}:{}", ns, self),
            _ => self.to_string(),
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CacheKey::Collection => "collection",
            CacheKey::Record(_) => "record",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Collection => f.write_str(COLLECTION_KEY),
            CacheKey::Record(id) => write!(f, "{}{}", RECORD_KEY_PREFIX, id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    #[test]
    fn test_collection_key_name() {
        assert_eq!(CacheKey::Collection.render(None), "allContacts");
    }

    #[test]
    fn test_record_key_name() {
        let id = ContactId::new(Uuid::nil());
        assert_eq!(
            CacheKey::Record(id).render(None),
            "contact:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_namespace_prefix() {
        assert_eq!(
            CacheKey::Collection.render(Some("staging")),
            "staging:allContacts"
        );
        assert_eq!(CacheKey::Collection.render(Some("")), "allContacts");
    }

    proptest! {
        #[test]
        fn prop_distinct_ids_never_share_a_key(a in any::<u128>(), b in any::<u128>()) {
            prop_assume!(a != b);
            let ka = CacheKey::Record(ContactId::new(Uuid::from_u128(a))).render(None);
            let kb = CacheKey::Record(ContactId::new(Uuid::from_u128(b))).render(None);
            prop_assert_ne!(&ka, &kb);
            prop_assert_ne!(ka.as_str(), COLLECTION_KEY);
        }
    }
}
