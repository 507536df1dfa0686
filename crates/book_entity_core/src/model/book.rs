//! Book entity and translation records.
//!
//! # Responsibility
//! - Hold one revision's state: shared fields plus per-language overlays.
//! - Validate required fields before persistence.
//!
//! # Invariants
//! - The default-language translation always exists and cannot be removed.
//! - `revision_translation_affected` is computed by storage only.
//! - `name` is at most `NAME_MAX_LENGTH` characters.

use crate::model::field::{
    translatable_fields, FieldValue, FIELD_AUTHOR, FIELD_ISBN, FIELD_NAME, FIELD_PRICE,
    FIELD_REVISION_TRANSLATION_AFFECTED, FIELD_USER_ID, NAME_MAX_LENGTH,
};
use crate::model::language::normalize_langcode;
use crate::model::revision::{Revision, RevisionId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable entity identifier assigned by storage on first save.
pub type BookEntityId = i64;

/// Account identifier. `0` is the anonymous/system user.
pub type UserId = i64;

/// Owner assigned when none is set at save time.
pub const ANONYMOUS_USER_ID: UserId = 0;

/// Validation failures for entity and bundle records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookValidationError {
    EmptyName { langcode: String },
    NameTooLong { langcode: String, length: usize },
    EmptyAuthor { langcode: String },
    NonFinitePrice { langcode: String },
    InvalidLangcode(String),
    MissingDefaultTranslation(String),
    CannotRemoveDefaultTranslation(String),
    EmptyBundle,
    EmptyBundleId,
    EmptyBundleLabel,
    BundleLabelTooLong { length: usize },
}

impl Display for BookValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName { langcode } => write!(f, "name is required ({langcode})"),
            Self::NameTooLong { langcode, length } => write!(
                f,
                "name has {length} characters, maximum is {NAME_MAX_LENGTH} ({langcode})"
            ),
            Self::EmptyAuthor { langcode } => write!(f, "author is required ({langcode})"),
            Self::NonFinitePrice { langcode } => {
                write!(f, "price must be a finite number ({langcode})")
            }
            Self::InvalidLangcode(value) => write!(f, "invalid language code: `{value}`"),
            Self::MissingDefaultTranslation(langcode) => {
                write!(f, "default translation `{langcode}` is missing")
            }
            Self::CannotRemoveDefaultTranslation(langcode) => {
                write!(f, "default translation `{langcode}` cannot be removed")
            }
            Self::EmptyBundle => write!(f, "entity bundle is required"),
            Self::EmptyBundleId => write!(f, "bundle id is required"),
            Self::EmptyBundleLabel => write!(f, "bundle label is required"),
            Self::BundleLabelTooLong { length } => {
                write!(f, "bundle label has {length} characters, maximum is 255")
            }
        }
    }
}

impl Error for BookValidationError {}

/// Language-specific field overlay of one revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookTranslation {
    pub langcode: String,
    pub name: String,
    pub isbn: i64,
    pub author: String,
    pub price: f64,
    /// Owner (`user_id`). Defaults to the anonymous user at save time.
    pub owner_id: Option<UserId>,
    #[serde(default)]
    revision_translation_affected: bool,
}

impl BookTranslation {
    /// Creates a translation without owner; `langcode` is taken verbatim
    /// and checked by `BookEntity::validate`.
    pub fn new(
        langcode: impl Into<String>,
        name: impl Into<String>,
        isbn: i64,
        author: impl Into<String>,
        price: f64,
    ) -> Self {
        Self {
            langcode: langcode.into(),
            name: name.into(),
            isbn,
            author: author.into(),
            price,
            owner_id: None,
            revision_translation_affected: false,
        }
    }

    /// Whether this translation changed in its revision.
    pub fn is_revision_translation_affected(&self) -> bool {
        self.revision_translation_affected
    }

    pub(crate) fn set_revision_translation_affected(&mut self, affected: bool) {
        self.revision_translation_affected = affected;
    }

    /// Returns the typed value of one translatable field.
    pub fn field_value(&self, field_name: &str) -> Option<FieldValue> {
        match field_name {
            FIELD_USER_ID => Some(FieldValue::EntityReference(self.owner_id)),
            FIELD_NAME => Some(FieldValue::String(self.name.clone())),
            FIELD_ISBN => Some(FieldValue::Integer(self.isbn)),
            FIELD_AUTHOR => Some(FieldValue::String(self.author.clone())),
            FIELD_PRICE => Some(FieldValue::Float(self.price)),
            FIELD_REVISION_TRANSLATION_AFFECTED => {
                Some(FieldValue::Boolean(self.revision_translation_affected))
            }
            _ => None,
        }
    }

    /// Copies every caller-editable translatable field from `source`.
    ///
    /// Language code and the computed affected flag are left untouched.
    pub fn copy_translatable_fields_from(&mut self, source: &BookTranslation) {
        for field in translatable_fields() {
            match field.name {
                FIELD_USER_ID => self.owner_id = source.owner_id,
                FIELD_NAME => self.name = source.name.clone(),
                FIELD_ISBN => self.isbn = source.isbn,
                FIELD_AUTHOR => self.author = source.author.clone(),
                FIELD_PRICE => self.price = source.price,
                _ => {}
            }
        }
    }

    fn validate(&self) -> Result<(), BookValidationError> {
        if normalize_langcode(&self.langcode).as_deref() != Some(self.langcode.as_str()) {
            return Err(BookValidationError::InvalidLangcode(self.langcode.clone()));
        }
        if self.name.trim().is_empty() {
            return Err(BookValidationError::EmptyName {
                langcode: self.langcode.clone(),
            });
        }
        let length = self.name.chars().count();
        if length > NAME_MAX_LENGTH {
            return Err(BookValidationError::NameTooLong {
                langcode: self.langcode.clone(),
                length,
            });
        }
        if self.author.trim().is_empty() {
            return Err(BookValidationError::EmptyAuthor {
                langcode: self.langcode.clone(),
            });
        }
        if !self.price.is_finite() {
            return Err(BookValidationError::NonFinitePrice {
                langcode: self.langcode.clone(),
            });
        }
        Ok(())
    }
}

/// One revision of a book entity with all of its translations.
///
/// A freshly loaded entity reflects the default revision; a loaded
/// revision snapshot carries `revision.is_default == false` unless it is
/// the default one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookEntity {
    pub id: Option<BookEntityId>,
    pub uuid: Uuid,
    /// Bundle (entity type) id.
    pub bundle: String,
    pub default_langcode: String,
    /// Publication status, shared by all translations.
    pub status: bool,
    /// Epoch seconds. Storage fills it on first save when zero.
    pub created: i64,
    /// Epoch seconds. Storage updates it on every save.
    pub changed: i64,
    pub revision: Revision,
    translations: BTreeMap<String, BookTranslation>,
    #[serde(skip)]
    removed_translations: BTreeSet<String>,
}

impl BookEntity {
    /// Creates a new, unsaved entity with a generated uuid.
    ///
    /// The given translation becomes the default language.
    pub fn new(bundle: impl Into<String>, default_translation: BookTranslation) -> Self {
        Self::with_uuid(Uuid::new_v4(), bundle, default_translation)
    }

    /// Creates a new, unsaved entity with a caller-provided uuid.
    pub fn with_uuid(
        uuid: Uuid,
        bundle: impl Into<String>,
        default_translation: BookTranslation,
    ) -> Self {
        let default_langcode = default_translation.langcode.clone();
        let mut translations = BTreeMap::new();
        translations.insert(default_langcode.clone(), default_translation);
        Self {
            id: None,
            uuid,
            bundle: bundle.into(),
            default_langcode,
            status: true,
            created: 0,
            changed: 0,
            revision: Revision::default(),
            translations,
            removed_translations: BTreeSet::new(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_storage(
        id: BookEntityId,
        uuid: Uuid,
        bundle: String,
        default_langcode: String,
        status: bool,
        created: i64,
        changed: i64,
        revision: Revision,
        translations: BTreeMap<String, BookTranslation>,
    ) -> Self {
        Self {
            id: Some(id),
            uuid,
            bundle,
            default_langcode,
            status,
            created,
            changed,
            revision,
            translations,
            removed_translations: BTreeSet::new(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn is_published(&self) -> bool {
        self.status
    }

    pub fn set_published(&mut self, published: bool) {
        self.status = published;
    }

    pub fn revision_id(&self) -> Option<RevisionId> {
        self.revision.revision_id
    }

    pub fn is_default_revision(&self) -> bool {
        self.revision.is_default
    }

    /// Name of the default translation.
    pub fn label(&self) -> &str {
        self.default_translation()
            .map_or("", |translation| translation.name.as_str())
    }

    pub fn default_translation(&self) -> Option<&BookTranslation> {
        self.translations.get(&self.default_langcode)
    }

    /// Owner of the default translation.
    pub fn owner_id(&self) -> Option<UserId> {
        self.default_translation()
            .and_then(|translation| translation.owner_id)
    }

    pub fn set_owner_id(&mut self, owner_id: UserId) {
        if let Some(translation) = self.translations.get_mut(&self.default_langcode) {
            translation.owner_id = Some(owner_id);
        }
    }

    pub fn has_translation(&self, langcode: &str) -> bool {
        self.translations.contains_key(langcode)
    }

    pub fn translation(&self, langcode: &str) -> Option<&BookTranslation> {
        self.translations.get(langcode)
    }

    pub fn translation_mut(&mut self, langcode: &str) -> Option<&mut BookTranslation> {
        self.translations.get_mut(langcode)
    }

    /// Language codes of all translations, sorted.
    pub fn translation_languages(&self) -> Vec<&str> {
        self.translations.keys().map(String::as_str).collect()
    }

    pub fn translations(&self) -> impl Iterator<Item = &BookTranslation> {
        self.translations.values()
    }

    pub fn has_translations(&self) -> bool {
        self.translations.len() > 1
    }

    /// Adds or replaces one translation.
    ///
    /// The computed affected flag of the incoming value is discarded.
    pub fn add_translation(
        &mut self,
        mut translation: BookTranslation,
    ) -> Result<(), BookValidationError> {
        let langcode = normalize_langcode(&translation.langcode)
            .ok_or_else(|| BookValidationError::InvalidLangcode(translation.langcode.clone()))?;
        translation.langcode = langcode.clone();
        translation.revision_translation_affected = false;
        self.removed_translations.remove(&langcode);
        self.translations.insert(langcode, translation);
        Ok(())
    }

    /// Removes one non-default translation from the next saved revision.
    pub fn remove_translation(
        &mut self,
        langcode: &str,
    ) -> Result<Option<BookTranslation>, BookValidationError> {
        if langcode == self.default_langcode {
            return Err(BookValidationError::CannotRemoveDefaultTranslation(langcode.to_string()));
        }
        let removed = self.translations.remove(langcode);
        self.removed_translations.insert(langcode.to_string());
        Ok(removed)
    }

    pub(crate) fn removed_translations(&self) -> &BTreeSet<String> {
        &self.removed_translations
    }

    pub(crate) fn clear_removed_translations(&mut self) {
        self.removed_translations.clear();
    }

    pub(crate) fn translations_mut(&mut self) -> impl Iterator<Item = &mut BookTranslation> {
        self.translations.values_mut()
    }

    pub(crate) fn insert_translation_unchecked(&mut self, translation: BookTranslation) {
        self.translations
            .insert(translation.langcode.clone(), translation);
    }

    /// Prepares metadata for the next save as a new revision.
    ///
    /// `author_id = None` lets storage default the author to the owner.
    pub fn set_new_revision(&mut self, log_message: impl Into<String>, author_id: Option<UserId>) {
        self.revision = Revision::pending(log_message, author_id);
    }

    /// Validates required fields of every translation.
    pub fn validate(&self) -> Result<(), BookValidationError> {
        if self.bundle.trim().is_empty() {
            return Err(BookValidationError::EmptyBundle);
        }
        if self.default_translation().is_none() {
            return Err(BookValidationError::MissingDefaultTranslation(
                self.default_langcode.clone(),
            ));
        }
        for (langcode, translation) in &self.translations {
            if langcode != &translation.langcode {
                return Err(BookValidationError::InvalidLangcode(translation.langcode.clone()));
            }
            translation.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BookEntity, BookTranslation, BookValidationError};
    use crate::model::field::FieldValue;

    fn dune() -> BookEntity {
        BookEntity::new(
            "novel",
            BookTranslation::new("en", "Dune", 123, "Herbert", 9.99),
        )
    }

    #[test]
    fn new_entity_is_published_and_unsaved() {
        let entity = dune();
        assert!(entity.is_new());
        assert!(entity.is_published());
        assert_eq!(entity.label(), "Dune");
        assert_eq!(entity.translation_languages(), vec!["en"]);
        assert!(!entity.has_translations());
        entity.validate().expect("valid entity");
    }

    #[test]
    fn validate_rejects_long_and_blank_names() {
        let mut entity = dune();
        entity.translation_mut("en").unwrap().name = "x".repeat(51);
        assert!(matches!(
            entity.validate(),
            Err(BookValidationError::NameTooLong { length: 51, .. })
        ));

        entity.translation_mut("en").unwrap().name = "   ".to_string();
        assert!(matches!(
            entity.validate(),
            Err(BookValidationError::EmptyName { .. })
        ));
    }

    #[test]
    fn validate_rejects_blank_author_and_nan_price() {
        let mut entity = dune();
        entity.translation_mut("en").unwrap().author = String::new();
        assert!(matches!(
            entity.validate(),
            Err(BookValidationError::EmptyAuthor { .. })
        ));

        let mut entity = dune();
        entity.translation_mut("en").unwrap().price = f64::NAN;
        assert!(matches!(
            entity.validate(),
            Err(BookValidationError::NonFinitePrice { .. })
        ));
    }

    #[test]
    fn add_translation_normalizes_langcode() {
        let mut entity = dune();
        entity
            .add_translation(BookTranslation::new("FR", "Dune", 123, "Herbert", 11.0))
            .expect("translation");
        assert!(entity.has_translation("fr"));
        assert!(entity.has_translations());

        let err = entity
            .add_translation(BookTranslation::new("french", "Dune", 1, "H", 1.0))
            .expect_err("invalid langcode");
        assert_eq!(err, BookValidationError::InvalidLangcode("french".into()));
    }

    #[test]
    fn default_translation_cannot_be_removed() {
        let mut entity = dune();
        let err = entity.remove_translation("en").expect_err("default");
        assert_eq!(
            err,
            BookValidationError::CannotRemoveDefaultTranslation("en".into())
        );
    }

    #[test]
    fn remove_translation_is_tracked_until_saved() {
        let mut entity = dune();
        entity
            .add_translation(BookTranslation::new("de", "Der Wüstenplanet", 123, "Herbert", 12.5))
            .unwrap();
        let removed = entity.remove_translation("de").unwrap();
        assert!(removed.is_some());
        assert!(entity.removed_translations().contains("de"));

        entity
            .add_translation(BookTranslation::new("de", "Dune", 123, "Herbert", 12.5))
            .unwrap();
        assert!(!entity.removed_translations().contains("de"));
    }

    #[test]
    fn copy_translatable_fields_keeps_language() {
        let mut target = BookTranslation::new("fr", "Dune", 1, "Herbert", 1.0);
        let mut source = BookTranslation::new("en", "Dune Messiah", 2, "F. Herbert", 2.0);
        source.owner_id = Some(7);

        target.copy_translatable_fields_from(&source);
        assert_eq!(target.langcode, "fr");
        assert_eq!(target.name, "Dune Messiah");
        assert_eq!(target.field_value("isbn"), Some(FieldValue::Integer(2)));
        assert_eq!(target.owner_id, Some(7));
    }
}
