//! Repository layer for revisioned book entity storage.
//!
//! # Responsibility
//! - Define data access contracts for entities, revisions and bundles.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes enforce `BookEntity::validate()` before persistence.
//! - Repository APIs return semantic errors (`EntityNotFound`,
//!   `RevisionNotFound`) in addition to DB transport errors.

pub mod book_repo;
pub mod bundle_repo;
