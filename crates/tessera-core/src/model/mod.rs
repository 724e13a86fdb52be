//! Domain records persisted by the store
//!
//! Records carry data only. Equality, hashing and ordering are defined by
//! `id` alone, so two values describing the same row compare equal even when
//! one of them has pending edits.

/// Derive identity semantics (Eq/Hash/Ord) from the `id` field.
macro_rules! identity_by_id {
    ($ty:ty) => {
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }

        impl Eq for $ty {}

        impl std::hash::Hash for $ty {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.id.hash(state);
            }
        }

        impl PartialOrd for $ty {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $ty {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                self.id.cmp(&other.id)
            }
        }
    };
}

pub mod attachment;
pub mod course;
pub mod tag;
pub mod user;

pub use attachment::Attachment;
pub use course::{Course, CourseStatus};
pub use tag::Tag;
pub use user::{Role, User};

use crate::errors::ModelError;

/// Reject empty or whitespace-only text
pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ModelError> {
    if value.trim().is_empty() {
        return Err(ModelError::EmptyField { field });
    }
    Ok(())
}
