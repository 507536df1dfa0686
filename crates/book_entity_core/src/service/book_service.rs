//! Book entity revision use-case service.
//!
//! # Responsibility
//! - Gate every user-facing operation through the access policy.
//! - Orchestrate create/update/revert/delete on top of the repository.
//! - Report the outcome of guarded revision deletes.
//!
//! # Invariants
//! - Only `AccessResult::Deny` blocks an operation.
//! - Revert never rewrites history; it always saves a new default revision.
//! - Service layer remains storage-agnostic.

use crate::access::account::AccountProxy;
use crate::access::policy::{decide, Operation};
use crate::model::book::{BookEntity, BookEntityId, BookTranslation, BookValidationError, UserId};
use crate::model::language::{normalize_langcode, LANGCODE_DEFAULT};
use crate::model::revision::RevisionId;
use crate::repo::book_repo::{BookListQuery, BookRepository, BookSummary, RepoError};
use crate::repo::bundle_repo::BundleRepository;
use crate::sanitize::{HtmlEscaper, Sanitizer};
use crate::service::history::{build_timeline, RevisionTimeline};
use crate::translation::{resolve, TranslationError};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for book entity use-cases.
#[derive(Debug)]
pub enum BookServiceError {
    /// The access policy denied the operation.
    PermissionDenied { operation: String },
    EntityNotFound(BookEntityId),
    RevisionNotFound(RevisionId),
    BundleNotFound(String),
    InvalidOperation(String),
    NoSuchTranslation { langcode: String },
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for BookServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied { operation } => {
                write!(f, "access denied for operation `{operation}`")
            }
            Self::EntityNotFound(id) => write!(f, "book entity not found: {id}"),
            Self::RevisionNotFound(id) => write!(f, "book entity revision not found: {id}"),
            Self::BundleNotFound(id) => write!(f, "book entity type not found: {id}"),
            Self::InvalidOperation(message) => write!(f, "invalid operation: {message}"),
            Self::NoSuchTranslation { langcode } => {
                write!(f, "no translation for language `{langcode}`")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BookServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for BookServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::EntityNotFound(id) => Self::EntityNotFound(id),
            RepoError::RevisionNotFound(id) => Self::RevisionNotFound(id),
            RepoError::BundleNotFound(id) => Self::BundleNotFound(id),
            RepoError::InvalidOperation(message) => Self::InvalidOperation(message),
            other => Self::Repo(other),
        }
    }
}

impl From<TranslationError> for BookServiceError {
    fn from(value: TranslationError) -> Self {
        match value {
            TranslationError::NoSuchTranslation { langcode } => {
                Self::NoSuchTranslation { langcode }
            }
        }
    }
}

impl From<BookValidationError> for BookServiceError {
    fn from(value: BookValidationError) -> Self {
        Self::Repo(RepoError::Validation(value))
    }
}

/// Caller input for creating a new book entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookDraft {
    /// Default language; the service default applies when `None`.
    pub langcode: Option<String>,
    pub name: String,
    pub isbn: i64,
    pub author: String,
    pub price: f64,
    /// Owner; the current account when `None`.
    pub owner_id: Option<UserId>,
    pub published: bool,
    pub log_message: String,
}

impl BookDraft {
    pub fn new(name: impl Into<String>, isbn: i64, author: impl Into<String>, price: f64) -> Self {
        Self {
            langcode: None,
            name: name.into(),
            isbn,
            author: author.into(),
            price,
            owner_id: None,
            published: true,
            log_message: String::new(),
        }
    }

    pub fn in_language(mut self, langcode: impl Into<String>) -> Self {
        self.langcode = Some(langcode.into());
        self
    }
}

/// Save options for `BookService::update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOptions {
    pub new_revision: bool,
    /// Replaces the revision log message when set.
    pub log_message: Option<String>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            new_revision: true,
            log_message: None,
        }
    }
}

impl SaveOptions {
    pub fn new_revision(log_message: impl Into<String>) -> Self {
        Self {
            new_revision: true,
            log_message: Some(log_message.into()),
        }
    }

    pub fn in_place() -> Self {
        Self {
            new_revision: false,
            log_message: None,
        }
    }
}

/// Revert request, routed by the entity's translation count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RevertCommand {
    /// Copy every translation of the revision.
    WholeRevision { revision_id: RevisionId },
    /// Copy one language's translatable fields onto the current default.
    Translation {
        revision_id: RevisionId,
        langcode: String,
    },
}

impl RevertCommand {
    /// Picks the translation variant for multilingual entities.
    pub fn for_entity(
        has_translations: bool,
        revision_id: RevisionId,
        langcode: impl Into<String>,
    ) -> Self {
        if has_translations {
            Self::Translation {
                revision_id,
                langcode: langcode.into(),
            }
        } else {
            Self::WholeRevision { revision_id }
        }
    }

    pub fn revision_id(&self) -> RevisionId {
        match self {
            Self::WholeRevision { revision_id } | Self::Translation { revision_id, .. } => {
                *revision_id
            }
        }
    }
}

/// Result of a successful revision deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionDeleteOutcome {
    pub entity_id: BookEntityId,
    pub deleted_revision_id: RevisionId,
    pub remaining_revisions: u64,
}

impl RevisionDeleteOutcome {
    /// Whether a history listing still has more than one entry to show.
    pub fn shows_history(&self) -> bool {
        self.remaining_revisions > 1
    }
}

/// Log message stored on revisions created by revert.
pub fn revert_log_message(revision_created: i64) -> String {
    format!("Copy of the revision from {revision_created}.")
}

/// Book entity service facade over repository implementations.
pub struct BookService<R, B, A>
where
    R: BookRepository,
    B: BundleRepository,
    A: AccountProxy,
{
    repo: R,
    bundles: B,
    account: A,
    sanitizer: Box<dyn Sanitizer>,
    default_langcode: String,
}

impl<R, B, A> BookService<R, B, A>
where
    R: BookRepository,
    B: BundleRepository,
    A: AccountProxy,
{
    /// Creates a service acting on behalf of `account`.
    pub fn new(repo: R, bundles: B, account: A) -> Self {
        Self {
            repo,
            bundles,
            account,
            sanitizer: Box::new(HtmlEscaper),
            default_langcode: LANGCODE_DEFAULT.to_string(),
        }
    }

    pub fn with_sanitizer(mut self, sanitizer: Box<dyn Sanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Sets the language used for drafts without an explicit langcode.
    pub fn with_default_langcode(mut self, langcode: &str) -> Result<Self, BookServiceError> {
        self.default_langcode = normalize_langcode(langcode)
            .ok_or_else(|| BookValidationError::InvalidLangcode(langcode.to_string()))?;
        Ok(self)
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Creates and saves a new entity with its first revision.
    pub fn create(&self, bundle: &str, draft: BookDraft) -> Result<BookEntity, BookServiceError> {
        self.check_access(
            &Operation::Create {
                bundle: bundle.to_string(),
            },
            draft.published,
        )?;
        if self.bundles.get_bundle(bundle)?.is_none() {
            return Err(BookServiceError::BundleNotFound(bundle.to_string()));
        }

        let raw_langcode = draft
            .langcode
            .unwrap_or_else(|| self.default_langcode.clone());
        let langcode = normalize_langcode(&raw_langcode)
            .ok_or(BookValidationError::InvalidLangcode(raw_langcode))?;

        let mut translation =
            BookTranslation::new(langcode, draft.name, draft.isbn, draft.author, draft.price);
        translation.owner_id = Some(draft.owner_id.unwrap_or_else(|| self.account.id()));

        let mut entity = BookEntity::new(bundle, translation);
        entity.set_published(draft.published);
        entity.set_new_revision(draft.log_message, Some(self.account.id()));
        self.repo.save(&mut entity, true)?;
        Ok(entity)
    }

    /// Loads the default revision.
    pub fn load(&self, id: BookEntityId) -> Result<BookEntity, BookServiceError> {
        let entity = self.repo.load(id)?;
        self.check_access(&Operation::View, entity.is_published())?;
        Ok(entity)
    }

    /// Loads one revision snapshot.
    pub fn load_revision(&self, revision_id: RevisionId) -> Result<BookEntity, BookServiceError> {
        let revision = self.repo.load_revision(revision_id)?;
        self.check_access(&Operation::View, revision.is_published())?;
        Ok(revision)
    }

    /// Saves changes to an existing entity.
    ///
    /// New revisions are authored by the current account.
    pub fn update(
        &self,
        entity: &mut BookEntity,
        options: SaveOptions,
    ) -> Result<RevisionId, BookServiceError> {
        if entity.is_new() {
            return Err(BookServiceError::InvalidOperation(
                "unsaved book entity must be created first".to_string(),
            ));
        }
        self.check_access(&Operation::Update, entity.is_published())?;

        if options.new_revision {
            entity.set_new_revision(
                options.log_message.unwrap_or_default(),
                Some(self.account.id()),
            );
        } else if let Some(log_message) = options.log_message {
            entity.revision.log_message = log_message;
        }
        Ok(self.repo.save(entity, options.new_revision)?)
    }

    /// Copies a historical revision (or one of its translations) into a new
    /// default revision.
    pub fn revert(&self, command: &RevertCommand) -> Result<BookEntity, BookServiceError> {
        let historical = self.repo.load_revision(command.revision_id())?;
        self.check_access(&Operation::RevertRevision, historical.is_published())?;
        if historical.is_default_revision() {
            return Err(BookServiceError::InvalidOperation(format!(
                "revision {} is already the default revision",
                command.revision_id()
            )));
        }
        let entity_id = historical.id.ok_or(BookServiceError::InvalidOperation(
            "revision without entity id".to_string(),
        ))?;

        let mut reverted = match command {
            RevertCommand::WholeRevision { .. } => {
                let current = self.repo.load(entity_id)?;
                let mut reverted = historical.clone();
                for langcode in current.translation_languages() {
                    if !reverted.has_translation(langcode) {
                        reverted.remove_translation(langcode)?;
                    }
                }
                reverted
            }
            RevertCommand::Translation { langcode, .. } => {
                let source = resolve(&historical, langcode)?;
                let mut current = self.repo.load(entity_id)?;
                match current.translation_mut(langcode) {
                    Some(target) => target.copy_translatable_fields_from(source),
                    None => current.add_translation(source.clone())?,
                }
                current
            }
        };

        reverted.set_new_revision(
            revert_log_message(historical.revision.created),
            Some(self.account.id()),
        );
        let revision_id = self.repo.save(&mut reverted, true)?;
        info!(
            "event=book_revert module=service status=ok entity_id={} source_revision_id={} revision_id={}",
            entity_id,
            command.revision_id(),
            revision_id
        );
        Ok(reverted)
    }

    /// Deletes one non-default revision.
    pub fn delete_revision(
        &self,
        revision_id: RevisionId,
    ) -> Result<RevisionDeleteOutcome, BookServiceError> {
        let revision = self.repo.load_revision(revision_id)?;
        self.check_access(&Operation::DeleteRevision, revision.is_published())?;
        let entity_id = revision.id.ok_or(BookServiceError::InvalidOperation(
            "revision without entity id".to_string(),
        ))?;

        self.repo.delete_revision(revision_id)?;
        Ok(RevisionDeleteOutcome {
            entity_id,
            deleted_revision_id: revision_id,
            remaining_revisions: self.repo.count_revisions(entity_id)?,
        })
    }

    /// Deletes the entity with all of its revisions.
    pub fn delete(&self, id: BookEntityId) -> Result<(), BookServiceError> {
        let entity = self.repo.load(id)?;
        self.check_access(&Operation::Delete, entity.is_published())?;
        self.repo.delete(id)?;
        Ok(())
    }

    /// Retags all revisions of a removed language as "not specified".
    ///
    /// System operation: no access check.
    pub fn clear_language(&self, langcode: &str) -> Result<usize, BookServiceError> {
        Ok(self.repo.clear_revisions_language(langcode)?)
    }

    /// Lists default revisions the current account may view.
    pub fn list(&self, query: &BookListQuery) -> Result<Vec<BookSummary>, BookServiceError> {
        let summaries = self.repo.list_entities(query)?;
        Ok(summaries
            .into_iter()
            .filter(|summary| !decide(&Operation::View, summary.status, &self.account).is_denied())
            .collect())
    }

    /// Builds the revision timeline of one entity in one language.
    pub fn history(
        &self,
        id: BookEntityId,
        langcode: &str,
    ) -> Result<RevisionTimeline, BookServiceError> {
        let entity = self.load(id)?;
        Ok(build_timeline(
            &self.repo,
            &entity,
            langcode,
            &self.account,
            self.sanitizer.as_ref(),
        )?)
    }

    fn check_access(
        &self,
        operation: &Operation,
        is_published: bool,
    ) -> Result<(), BookServiceError> {
        if decide(operation, is_published, &self.account).is_denied() {
            warn!(
                "event=book_access module=service status=denied operation={} account_id={}",
                operation.as_str(),
                self.account.id()
            );
            return Err(BookServiceError::PermissionDenied {
                operation: operation.as_str().to_string(),
            });
        }
        Ok(())
    }
}
