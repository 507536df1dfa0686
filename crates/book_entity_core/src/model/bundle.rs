//! Bundle (book entity type) configuration record.
//!
//! Bundles are configuration, not content: they are never revisioned and
//! their lifecycle is independent of the entities that reference them.

use crate::model::book::BookValidationError;
use serde::{Deserialize, Serialize};

/// Maximum bundle label length in characters.
pub const BUNDLE_LABEL_MAX_LENGTH: usize = 255;

/// A configured sub-kind of book entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookEntityType {
    /// Registry key referenced by `BookEntity::bundle`.
    pub id: String,
    pub label: String,
}

impl BookEntityType {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    pub fn validate(&self) -> Result<(), BookValidationError> {
        if self.id.trim().is_empty() {
            return Err(BookValidationError::EmptyBundleId);
        }
        if self.label.trim().is_empty() {
            return Err(BookValidationError::EmptyBundleLabel);
        }
        let length = self.label.chars().count();
        if length > BUNDLE_LABEL_MAX_LENGTH {
            return Err(BookValidationError::BundleLabelTooLong { length });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::BookEntityType;
    use crate::model::book::BookValidationError;

    #[test]
    fn validates_required_values() {
        BookEntityType::new("novel", "Novel")
            .validate()
            .expect("valid bundle");
        assert_eq!(
            BookEntityType::new(" ", "Novel").validate(),
            Err(BookValidationError::EmptyBundleId)
        );
        assert_eq!(
            BookEntityType::new("novel", "").validate(),
            Err(BookValidationError::EmptyBundleLabel)
        );
        assert_eq!(
            BookEntityType::new("novel", "x".repeat(256)).validate(),
            Err(BookValidationError::BundleLabelTooLong { length: 256 })
        );
    }
}
