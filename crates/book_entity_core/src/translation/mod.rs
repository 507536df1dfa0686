//! Translation overlay over stored revisions.
//!
//! # Responsibility
//! - Resolve a requested language against one revision's translations.
//! - Decide whether a translation was affected by its revision.
//!
//! # Invariants
//! - A translation is affected when it is the first revision carrying its
//!   language, or when its content differs from the closest earlier
//!   revision carrying the same language.
//! - Shared (non-translatable) field changes only affect the default
//!   language translation.

mod overlay;

pub use overlay::{
    affected_languages, is_affected, resolve, resolve_or_default, translation_changed,
    TranslationError, TranslationSnapshot,
};
