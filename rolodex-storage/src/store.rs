//! Persistent store contract and the in-memory implementation.
//!
//! The store is authoritative: it assigns ids, stamps timestamps, and enforces
//! uniqueness of `email` and `phone`. It knows nothing about caching.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use rolodex_core::{
    Contact, ContactId, ContactPatch, NewContact, RolodexError, RolodexResult, StorageError,
};

/// CRUD over contact records.
///
/// `find_all` makes no ordering promise. Uniqueness violations on `insert`
/// and `update_by_id` surface as [`RolodexError::Conflict`].
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn find_by_id(&self, id: ContactId) -> RolodexResult<Option<Contact>>;

    async fn find_all(&self) -> RolodexResult<Vec<Contact>>;

    /// Persist a new contact and return it with its assigned id.
    async fn insert(&self, new: NewContact) -> RolodexResult<Contact>;

    /// Apply `patch` and return the post-update record, or `None` if `id`
    /// does not exist.
    async fn update_by_id(
        &self,
        id: ContactId,
        patch: &ContactPatch,
    ) -> RolodexResult<Option<Contact>>;

    /// Remove the record and return what was removed, or `None` if absent.
    async fn delete_by_id(&self, id: ContactId) -> RolodexResult<Option<Contact>>;

    /// Readiness probe.
    async fn health_check(&self) -> RolodexResult<()> {
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Lock-guarded in-memory store with the same uniqueness rules as the
/// PostgreSQL adapter. Used for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContactStore {
    contacts: Arc<RwLock<BTreeMap<ContactId, Contact>>>,
}

impl InMemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.contacts.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// First uniqueness violation against records other than `skip`.
fn unique_violation(
    contacts: &BTreeMap<ContactId, Contact>,
    skip: Option<ContactId>,
    email: Option<&str>,
    phone: Option<&str>,
) -> Option<RolodexError> {
    for existing in contacts.values() {
        if Some(existing.id) == skip {
            continue;
        }
        if let Some(email) = email {
            if existing.email == email {
                return Some(RolodexError::conflict("email", email));
            }
        }
        if let Some(phone) = phone {
            if existing.phone == phone {
                return Some(RolodexError::conflict("phone", phone));
            }
        }
    }
    None
}

#[async_trait]
impl ContactStore for InMemoryContactStore {
    async fn find_by_id(&self, id: ContactId) -> RolodexResult<Option<Contact>> {
        let contacts = self
            .contacts
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(contacts.get(&id).cloned())
    }

    async fn find_all(&self) -> RolodexResult<Vec<Contact>> {
        let contacts = self
            .contacts
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(contacts.values().cloned().collect())
    }

    async fn insert(&self, new: NewContact) -> RolodexResult<Contact> {
        let mut contacts = self
            .contacts
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        if let Some(err) = unique_violation(&contacts, None, Some(&new.email), Some(&new.phone)) {
            return Err(err);
        }
        let contact = Contact::from_new(ContactId::now_v7(), new, Utc::now());
        contacts.insert(contact.id, contact.clone());
        Ok(contact)
    }

    async fn update_by_id(
        &self,
        id: ContactId,
        patch: &ContactPatch,
    ) -> RolodexResult<Option<Contact>> {
        let mut contacts = self
            .contacts
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        if !contacts.contains_key(&id) {
            return Ok(None);
        }
        if let Some(err) = unique_violation(
            &contacts,
            Some(id),
            patch.email.as_deref(),
            patch.phone.as_deref(),
        ) {
            return Err(err);
        }
        let Some(contact) = contacts.get_mut(&id) else {
            return Ok(None);
        };
        contact.apply(patch, Utc::now());
        Ok(Some(contact.clone()))
    }

    async fn delete_by_id(&self, id: ContactId) -> RolodexResult<Option<Contact>> {
        let mut contacts = self
            .contacts
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(contacts.remove(&id))
    }
}

// ============================================================================
// TESTS
// ============================================================================
