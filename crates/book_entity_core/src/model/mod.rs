//! Book entity domain model.
//!
//! # Responsibility
//! - Define the typed entity, translation, revision and bundle records.
//! - Declare per-field revisionable/translatable capabilities statically.
//!
//! # Invariants
//! - Every entity carries a translation in its default language.
//! - Entity `id` and `uuid` never change once assigned.
//! - Exactly one revision per stored entity is the default revision.

pub mod book;
pub mod bundle;
pub mod field;
pub mod language;
pub mod revision;
