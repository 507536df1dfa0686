//! Static field definitions for the book entity.
//!
//! # Responsibility
//! - Describe every stored field with its revision/translation capabilities.
//! - Provide a typed value view used by change detection and revert.
//!
//! # Invariants
//! - Translatable fields live on `BookTranslation`; shared fields live on
//!   `BookEntity` and are replicated to every translation row.
//! - `read_only` fields are computed by storage and never copied from
//!   caller input.

use crate::model::book::UserId;
use serde::{Deserialize, Serialize};

/// Maximum length of the `name` field in characters.
pub const NAME_MAX_LENGTH: usize = 50;

/// Storage kind for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    EntityReference,
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
}

/// Declaration of one book entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDefinition {
    /// Column name in field data/revision tables.
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    /// Stored per revision.
    pub revisionable: bool,
    /// Stored per (revision, language).
    pub translatable: bool,
    pub required: bool,
    /// Computed by storage.
    pub read_only: bool,
}

impl FieldDefinition {
    const fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            revisionable: true,
            translatable: false,
            required: false,
            read_only: false,
        }
    }

    const fn translatable(mut self) -> Self {
        self.translatable = true;
        self
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Whether callers may copy this field between translations.
    pub fn is_copyable_translation_field(&self) -> bool {
        self.translatable && !self.read_only
    }
}

pub const FIELD_USER_ID: &str = "user_id";
pub const FIELD_NAME: &str = "name";
pub const FIELD_STATUS: &str = "status";
pub const FIELD_CREATED: &str = "created";
pub const FIELD_CHANGED: &str = "changed";
pub const FIELD_REVISION_TRANSLATION_AFFECTED: &str = "revision_translation_affected";
pub const FIELD_ISBN: &str = "isbn";
pub const FIELD_AUTHOR: &str = "author";
pub const FIELD_PRICE: &str = "price";

/// All stored book entity fields, in display order.
pub const BOOK_FIELDS: &[FieldDefinition] = &[
    FieldDefinition::new(FIELD_USER_ID, "Authored by", FieldKind::EntityReference).translatable(),
    FieldDefinition::new(FIELD_NAME, "Name", FieldKind::String)
        .translatable()
        .required(),
    FieldDefinition::new(FIELD_STATUS, "Publishing status", FieldKind::Boolean),
    FieldDefinition::new(FIELD_CREATED, "Created", FieldKind::Timestamp),
    FieldDefinition::new(FIELD_CHANGED, "Changed", FieldKind::Timestamp),
    FieldDefinition::new(
        FIELD_REVISION_TRANSLATION_AFFECTED,
        "Revision translation affected",
        FieldKind::Boolean,
    )
    .translatable()
    .read_only(),
    FieldDefinition::new(FIELD_ISBN, "ISBN", FieldKind::Integer)
        .translatable()
        .required(),
    FieldDefinition::new(FIELD_AUTHOR, "Author", FieldKind::String)
        .translatable()
        .required(),
    FieldDefinition::new(FIELD_PRICE, "Price", FieldKind::Float)
        .translatable()
        .required(),
];

/// Looks up one field definition by column name.
pub fn field_definition(name: &str) -> Option<&'static FieldDefinition> {
    BOOK_FIELDS.iter().find(|field| field.name == name)
}

/// Fields whose values differ per language and may be copied between
/// translations.
pub fn translatable_fields() -> impl Iterator<Item = &'static FieldDefinition> {
    BOOK_FIELDS
        .iter()
        .filter(|field| field.is_copyable_translation_field())
}

/// Revisionable fields shared by all translations of one revision.
///
/// `changed` is excluded: it moves on every save and never signals a
/// content change on its own.
pub fn shared_content_fields() -> impl Iterator<Item = &'static FieldDefinition> {
    BOOK_FIELDS.iter().filter(|field| {
        !field.translatable && !field.read_only && field.name != FIELD_CHANGED
    })
}

/// Typed value of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    EntityReference(Option<UserId>),
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(i64),
}
