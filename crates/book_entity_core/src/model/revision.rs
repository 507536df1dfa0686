//! Revision metadata model.
//!
//! # Invariants
//! - `revision_id` is `None` only for revisions that were never stored.
//! - `author_id` is immutable once the revision row exists.

use crate::model::book::UserId;
use serde::{Deserialize, Serialize};

/// Globally unique, monotonically increasing revision identifier.
pub type RevisionId = i64;

/// Metadata of one stored (or pending) revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub revision_id: Option<RevisionId>,
    /// Epoch seconds when the revision row was created.
    pub created: i64,
    /// Defaults to the entity owner when unset at save time.
    pub author_id: Option<UserId>,
    /// Free text. Escape before rendering.
    pub log_message: String,
    /// Derived from the entity base row; never set by callers.
    pub is_default: bool,
}

impl Revision {
    /// Creates metadata for a revision that is about to be saved.
    pub fn pending(log_message: impl Into<String>, author_id: Option<UserId>) -> Self {
        Self {
            revision_id: None,
            created: 0,
            author_id,
            log_message: log_message.into(),
            is_default: false,
        }
    }
}
