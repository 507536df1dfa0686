//! Core domain logic for revisioned, translatable book entities.
//! This crate is the single source of truth for revision invariants.

pub mod access;
pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod sanitize;
pub mod service;
pub mod translation;

pub use access::account::{AccountProxy, StaticAccount};
pub use access::policy::{decide, AccessResult, Operation};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::CoreConfig;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::book::{
    BookEntity, BookEntityId, BookTranslation, BookValidationError, UserId, ANONYMOUS_USER_ID,
};
pub use model::bundle::BookEntityType;
pub use model::revision::{Revision, RevisionId};
pub use repo::book_repo::{
    BookListQuery, BookRepository, BookSummary, RepoError, RepoResult, SqliteBookRepository,
};
pub use repo::bundle_repo::{BundleRepository, SqliteBundleRepository};
pub use sanitize::{HtmlEscaper, Sanitizer};
pub use service::book_service::{
    BookDraft, BookService, BookServiceError, RevertCommand, RevisionDeleteOutcome, SaveOptions,
};
pub use service::history::{RevisionAction, RevisionLink, RevisionTimeline, TimelineRow};
pub use translation::TranslationError;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
