use crate::model::book::{BookEntity, BookTranslation};
use crate::model::field::{
    shared_content_fields, translatable_fields, FieldValue, FIELD_CREATED, FIELD_STATUS,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Translation lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// The revision has no translation in the requested language.
    NoSuchTranslation { langcode: String },
}

impl Display for TranslationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSuchTranslation { langcode } => {
                write!(f, "no translation for language `{langcode}`")
            }
        }
    }
}

impl Error for TranslationError {}

/// Returns the translation for `langcode`.
///
/// Callers that want a best-effort value should use
/// `resolve_or_default`.
pub fn resolve<'a>(
    entity: &'a BookEntity,
    langcode: &str,
) -> Result<&'a BookTranslation, TranslationError> {
    entity
        .translation(langcode)
        .ok_or_else(|| TranslationError::NoSuchTranslation {
            langcode: langcode.to_string(),
        })
}

/// Returns the translation for `langcode`, falling back to the default
/// language.
pub fn resolve_or_default<'a>(
    entity: &'a BookEntity,
    langcode: &str,
) -> Result<&'a BookTranslation, TranslationError> {
    resolve(entity, langcode).or_else(|_| resolve(entity, &entity.default_langcode))
}

/// Whether the revision's translation in `langcode` was affected.
///
/// Missing translations are never affected.
pub fn is_affected(revision: &BookEntity, langcode: &str) -> bool {
    revision
        .translation(langcode)
        .is_some_and(BookTranslation::is_revision_translation_affected)
}

/// Languages affected by the given revision, sorted.
pub fn affected_languages(revision: &BookEntity) -> Vec<&str> {
    revision
        .translations()
        .filter(|translation| translation.is_revision_translation_affected())
        .map(|translation| translation.langcode.as_str())
        .collect()
}

/// Stored state of one translation row, including replicated shared
/// fields.
#[derive(Debug, Clone, Copy)]
pub struct TranslationSnapshot<'a> {
    pub translation: &'a BookTranslation,
    pub status: bool,
    pub created: i64,
}

impl TranslationSnapshot<'_> {
    fn shared_value(&self, field_name: &str) -> Option<FieldValue> {
        match field_name {
            FIELD_STATUS => Some(FieldValue::Boolean(self.status)),
            FIELD_CREATED => Some(FieldValue::Timestamp(self.created)),
            _ => None,
        }
    }
}

/// Computes the affected flag for `current`.
///
/// `previous` is the same language in the closest earlier revision, or
/// `None` when no earlier revision carries the language.
pub fn translation_changed(
    previous: Option<&TranslationSnapshot<'_>>,
    current: &TranslationSnapshot<'_>,
    is_default_langcode: bool,
) -> bool {
    let Some(previous) = previous else {
        return true;
    };

    let translated_changed = translatable_fields().any(|field| {
        previous.translation.field_value(field.name) != current.translation.field_value(field.name)
    });
    if translated_changed {
        return true;
    }

    is_default_langcode
        && shared_content_fields()
            .any(|field| previous.shared_value(field.name) != current.shared_value(field.name))
}
