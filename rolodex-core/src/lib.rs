//! Rolodex Core - Entity Types
//!
//! Contact records, request payloads, and the error taxonomy shared by the
//! storage, cache, and API crates. No I/O lives here.

mod contact;
mod error;
mod identity;

pub use contact::{Contact, ContactPatch, NewContact};
pub use error::{RolodexError, RolodexResult, StorageError, ValidationError};
pub use identity::{ContactId, Timestamp};
