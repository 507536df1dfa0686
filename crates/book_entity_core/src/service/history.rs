//! Revision timeline read model.
//!
//! # Responsibility
//! - List the revisions that affected one language, newest first.
//! - Attach revert/delete actions the current account may perform.
//!
//! # Invariants
//! - The first row is the current revision and carries no actions.
//! - Log messages are escaped before they enter a row.
//! - A language no revision carries yields empty rows, not an error.

use crate::access::account::AccountProxy;
use crate::access::policy::{decide, Operation};
use crate::model::book::{BookEntity, BookEntityId, UserId};
use crate::model::revision::RevisionId;
use crate::repo::book_repo::{BookRepository, RepoError, RepoResult};
use crate::sanitize::Sanitizer;
use crate::service::book_service::RevertCommand;
use crate::translation::{is_affected, resolve_or_default};
use log::debug;
use serde::Serialize;

/// Link target of one timeline row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RevisionLink {
    /// The entity itself; used for the default revision.
    Canonical { entity_id: BookEntityId },
    Revision {
        entity_id: BookEntityId,
        revision_id: RevisionId,
    },
}

/// Operation offered on one timeline row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RevisionAction {
    Revert { command: RevertCommand },
    Delete { revision_id: RevisionId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineRow {
    pub revision_id: RevisionId,
    pub created: i64,
    pub author_id: Option<UserId>,
    /// Escaped log message; `None` when blank.
    pub log_message: Option<String>,
    pub is_current: bool,
    pub link: RevisionLink,
    pub actions: Vec<RevisionAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevisionTimeline {
    pub entity_id: BookEntityId,
    pub langcode: String,
    pub has_translations: bool,
    /// Entity name in the requested language, or the default language.
    pub label: String,
    pub rows: Vec<TimelineRow>,
}

impl RevisionTimeline {
    pub fn current(&self) -> Option<&TimelineRow> {
        self.rows.first()
    }
}

/// Builds the timeline of `entity` for `langcode`.
///
/// `entity` is the default revision as loaded by the repository.
pub fn build_timeline<R>(
    repo: &R,
    entity: &BookEntity,
    langcode: &str,
    account: &dyn AccountProxy,
    sanitizer: &dyn Sanitizer,
) -> RepoResult<RevisionTimeline>
where
    R: BookRepository + ?Sized,
{
    let entity_id = entity.id.ok_or_else(|| {
        RepoError::InvalidOperation("unsaved book entity has no revisions".to_string())
    })?;
    let has_translations = entity.has_translations();
    let default_revision_id = entity.revision_id();
    let label = resolve_or_default(entity, langcode)
        .map(|translation| translation.name.clone())
        .unwrap_or_else(|_| entity.label().to_string());

    let may_revert =
        decide(&Operation::RevertRevision, entity.is_published(), account).is_allowed();
    let may_delete =
        decide(&Operation::DeleteRevision, entity.is_published(), account).is_allowed();

    let mut revision_ids = repo.revision_ids(entity_id)?;
    revision_ids.reverse();

    let mut rows: Vec<TimelineRow> = Vec::new();
    for revision_id in revision_ids {
        let revision = repo.load_revision(revision_id)?;
        if !is_affected(&revision, langcode) {
            continue;
        }

        let is_default = Some(revision_id) == default_revision_id;
        let link = if is_default {
            RevisionLink::Canonical { entity_id }
        } else {
            RevisionLink::Revision {
                entity_id,
                revision_id,
            }
        };
        let log_message = Some(revision.revision.log_message.trim())
            .filter(|message| !message.is_empty())
            .map(|message| sanitizer.escape(message));

        let is_current = rows.is_empty();
        let mut actions = Vec::new();
        if !is_current {
            if may_revert {
                actions.push(RevisionAction::Revert {
                    command: RevertCommand::for_entity(has_translations, revision_id, langcode),
                });
            }
            if may_delete && !is_default {
                actions.push(RevisionAction::Delete { revision_id });
            }
        }

        rows.push(TimelineRow {
            revision_id,
            created: revision.revision.created,
            author_id: revision.revision.author_id,
            log_message,
            is_current,
            link,
            actions,
        });
    }

    debug!(
        "event=book_history module=service status=ok entity_id={} langcode={} rows={}",
        entity_id,
        langcode,
        rows.len()
    );

    Ok(RevisionTimeline {
        entity_id,
        langcode: langcode.to_string(),
        has_translations,
        label,
        rows,
    })
}
