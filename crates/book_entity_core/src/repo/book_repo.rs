//! Book entity repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist base, field data, revision and field revision rows.
//! - Compute `revision_translation_affected` while saving.
//! - Answer revision-specific queries for the revision manager.
//!
//! # Invariants
//! - Write paths run in one `IMMEDIATE` transaction, so readers never see
//!   an entity with zero or two default revisions.
//! - Read paths load one revision row set inside a single transaction.
//! - Write paths call `BookEntity::validate()` before SQL mutations.
//! - Revision ids come from `AUTOINCREMENT` and are never reused.

use crate::clock::Clock;
use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::book::{
    BookEntity, BookEntityId, BookTranslation, BookValidationError, UserId, ANONYMOUS_USER_ID,
};
use crate::model::language::{is_locked_langcode, LANGCODE_NOT_SPECIFIED};
use crate::model::revision::{Revision, RevisionId};
use crate::translation::{translation_changed, TranslationSnapshot};
use log::{info, warn};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

const FIELD_ROW_COLUMNS: &str = "id,
    vid,
    langcode,
    user_id,
    name,
    isbn,
    author,
    price,
    status,
    created,
    changed,
    revision_translation_affected,
    default_langcode";

const REQUIRED_TABLES: &[&str] = &[
    "book_entity_type",
    "book_entity",
    "book_entity_field_data",
    "book_entity_revision",
    "book_entity_field_revision",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for book entity persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(BookValidationError),
    Db(DbError),
    EntityNotFound(BookEntityId),
    RevisionNotFound(RevisionId),
    BundleNotFound(String),
    DuplicateBundle(String),
    /// The operation would break a storage invariant.
    InvalidOperation(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    /// Persisted rows cannot be converted into a valid entity.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::EntityNotFound(id) => write!(f, "book entity not found: {id}"),
            Self::RevisionNotFound(id) => write!(f, "book entity revision not found: {id}"),
            Self::BundleNotFound(id) => write!(f, "book entity type not found: {id}"),
            Self::DuplicateBundle(id) => write!(f, "book entity type already exists: {id}"),
            Self::InvalidOperation(message) => write!(f, "invalid operation: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "book repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "book repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted book data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BookValidationError> for RepoError {
    fn from(value: BookValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing entities by their default revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookListQuery {
    pub bundle: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// List read model built from default-language field data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSummary {
    pub id: BookEntityId,
    pub uuid: Uuid,
    pub bundle: String,
    pub label: String,
    pub langcode: String,
    pub status: bool,
    pub changed: i64,
}

/// Repository interface for revisioned book entity storage.
pub trait BookRepository {
    /// Loads the default revision with all of its translations.
    fn load(&self, id: BookEntityId) -> RepoResult<BookEntity>;
    /// Loads one revision snapshot.
    fn load_revision(&self, revision_id: RevisionId) -> RepoResult<BookEntity>;
    /// Saves the entity and returns the id of the written revision.
    ///
    /// New entities always get a first revision. Otherwise
    /// `new_revision = false` rewrites the current default revision.
    fn save(&self, entity: &mut BookEntity, new_revision: bool) -> RepoResult<RevisionId>;
    /// Deletes one non-default revision.
    ///
    /// Rejects the default revision, the last default language revision
    /// and any revision holding the only copy of a language. The checks
    /// and the delete share one write transaction.
    fn delete_revision(&self, revision_id: RevisionId) -> RepoResult<()>;
    /// Deletes the entity with all revisions and translations.
    fn delete(&self, id: BookEntityId) -> RepoResult<()>;
    /// Revision ids of one entity, ascending.
    fn revision_ids(&self, id: BookEntityId) -> RepoResult<Vec<RevisionId>>;
    /// Revision ids in which `user_id` owns any translation, ascending.
    fn user_revision_ids(&self, user_id: UserId) -> RepoResult<Vec<RevisionId>>;
    /// Number of revision rows flagged as the default language.
    fn count_default_language_revisions(&self, id: BookEntityId) -> RepoResult<u64>;
    /// Number of distinct revisions of one entity.
    fn count_revisions(&self, id: BookEntityId) -> RepoResult<u64>;
    /// Revision ids of one entity carrying `langcode`, ascending.
    fn revision_ids_with_language(
        &self,
        id: BookEntityId,
        langcode: &str,
    ) -> RepoResult<Vec<RevisionId>>;
    /// Languages of the default revision, sorted.
    fn translation_languages(&self, id: BookEntityId) -> RepoResult<Vec<String>>;
    /// Retags every row in `langcode` as "not specified".
    ///
    /// Returns the number of revision rows changed.
    fn clear_revisions_language(&self, langcode: &str) -> RepoResult<usize>;
    /// Lists default revisions ordered by entity id.
    fn list_entities(&self, query: &BookListQuery) -> RepoResult<Vec<BookSummary>>;
}

/// SQLite-backed book entity repository.
pub struct SqliteBookRepository<'conn> {
    conn: &'conn Connection,
    clock: Arc<dyn Clock>,
}

impl<'conn> SqliteBookRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection, clock: Arc<dyn Clock>) -> RepoResult<Self> {
        ensure_book_connection_ready(conn)?;
        Ok(Self { conn, clock })
    }
}

impl BookRepository for SqliteBookRepository<'_> {
    fn load(&self, id: BookEntityId) -> RepoResult<BookEntity> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let base = load_base_row(&tx, id)?.ok_or(RepoError::EntityNotFound(id))?;
        let vid = base.default_vid()?;
        let rows = load_field_rows(&tx, "book_entity_field_data", "id", id)?;
        let entity = assemble_entity(&tx, &base, vid, rows)?;
        tx.commit()?;
        Ok(entity)
    }

    fn load_revision(&self, revision_id: RevisionId) -> RepoResult<BookEntity> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let entity_id = revision_entity_id(&tx, revision_id)?
            .ok_or(RepoError::RevisionNotFound(revision_id))?;
        let base = load_base_row(&tx, entity_id)?.ok_or(RepoError::EntityNotFound(entity_id))?;
        let rows = load_field_rows(&tx, "book_entity_field_revision", "vid", revision_id)?;
        let entity = assemble_entity(&tx, &base, revision_id, rows)?;
        tx.commit()?;
        Ok(entity)
    }

    fn save(&self, target: &mut BookEntity, new_revision: bool) -> RepoResult<RevisionId> {
        target.validate()?;
        let now = self.clock.now();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        // Defaults land on a working copy; the caller's entity changes only after commit.
        let mut working = target.clone();
        let entity = &mut working;

        let (entity_id, current_vid) = match entity.id {
            None => {
                if !bundle_exists(&tx, &entity.bundle)? {
                    return Err(RepoError::BundleNotFound(entity.bundle.clone()));
                }
                tx.execute(
                    "INSERT INTO book_entity (vid, type, uuid, langcode)
                     VALUES (NULL, ?1, ?2, ?3);",
                    params![
                        entity.bundle.as_str(),
                        entity.uuid.to_string(),
                        entity.default_langcode.as_str(),
                    ],
                )?;
                (tx.last_insert_rowid(), None)
            }
            Some(id) => {
                let base = load_base_row(&tx, id)?.ok_or(RepoError::EntityNotFound(id))?;
                if base.bundle != entity.bundle {
                    return Err(RepoError::InvalidOperation(format!(
                        "bundle of book entity {id} cannot change from `{}` to `{}`",
                        base.bundle, entity.bundle
                    )));
                }
                (id, Some(base.default_vid()?))
            }
        };
        let creates_revision = new_revision || current_vid.is_none();

        if entity.created == 0 {
            entity.created = now;
        }
        entity.changed = now;
        for translation in entity.translations_mut() {
            if translation.owner_id.is_none() {
                translation.owner_id = Some(ANONYMOUS_USER_ID);
            }
        }

        let vid = if creates_revision {
            if let Some(previous_vid) = current_vid {
                carry_forward_translations(&tx, entity, previous_vid)?;
            }
            if entity.revision.author_id.is_none() {
                entity.revision.author_id = Some(entity.owner_id().unwrap_or(ANONYMOUS_USER_ID));
            }
            entity.revision.created = now;
            tx.execute(
                "INSERT INTO book_entity_revision (
                    id,
                    langcode,
                    revision_created,
                    revision_user,
                    revision_log_message
                ) VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    entity_id,
                    entity.default_langcode.as_str(),
                    entity.revision.created,
                    entity.revision.author_id,
                    entity.revision.log_message.as_str(),
                ],
            )?;
            tx.last_insert_rowid()
        } else {
            let vid = current_vid.ok_or(RepoError::EntityNotFound(entity_id))?;
            let stored = load_revision_meta(&tx, vid)?.ok_or(RepoError::RevisionNotFound(vid))?;
            entity.revision.created = stored.created;
            entity.revision.author_id = stored.author_id;
            tx.execute(
                "UPDATE book_entity_revision
                 SET
                    langcode = ?2,
                    revision_log_message = ?3
                 WHERE vid = ?1;",
                params![
                    vid,
                    entity.default_langcode.as_str(),
                    entity.revision.log_message.as_str(),
                ],
            )?;
            tx.execute(
                "DELETE FROM book_entity_field_revision WHERE vid = ?1;",
                [vid],
            )?;
            vid
        };

        let mut affected = Vec::new();
        for translation in entity.translations() {
            let previous = load_previous_translation(&tx, entity_id, &translation.langcode, vid)?;
            let previous_snapshot = previous.as_ref().map(FieldRow::snapshot);
            let current_snapshot = TranslationSnapshot {
                translation,
                status: entity.status,
                created: entity.created,
            };
            affected.push(translation_changed(
                previous_snapshot.as_ref(),
                &current_snapshot,
                translation.langcode == entity.default_langcode,
            ));
        }
        for (translation, flag) in entity.translations_mut().zip(affected) {
            translation.set_revision_translation_affected(flag);
        }

        for translation in entity.translations() {
            insert_field_row(
                &tx,
                "book_entity_field_revision",
                entity,
                entity_id,
                vid,
                translation,
            )?;
        }

        tx.execute(
            "UPDATE book_entity SET vid = ?2, langcode = ?3 WHERE id = ?1;",
            params![entity_id, vid, entity.default_langcode.as_str()],
        )?;
        tx.execute(
            "DELETE FROM book_entity_field_data WHERE id = ?1;",
            [entity_id],
        )?;
        for translation in entity.translations() {
            insert_field_row(
                &tx,
                "book_entity_field_data",
                entity,
                entity_id,
                vid,
                translation,
            )?;
        }

        tx.commit()?;

        working.id = Some(entity_id);
        working.revision.revision_id = Some(vid);
        working.revision.is_default = true;
        working.clear_removed_translations();
        let translations = working.translation_languages().len();

        info!(
            "event=book_save module=repo status=ok entity_id={} revision_id={} new_revision={} translations={}",
            entity_id,
            vid,
            creates_revision,
            translations
        );
        *target = working;
        Ok(vid)
    }

    fn delete_revision(&self, revision_id: RevisionId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let entity_id = revision_entity_id(&tx, revision_id)?
            .ok_or(RepoError::RevisionNotFound(revision_id))?;
        let base = load_base_row(&tx, entity_id)?.ok_or(RepoError::EntityNotFound(entity_id))?;
        if let Err(reason) = check_revision_deletable(&tx, &base, revision_id) {
            warn!(
                "event=book_revision_delete module=repo status=rejected entity_id={} revision_id={}",
                entity_id, revision_id
            );
            return Err(reason);
        }

        tx.execute(
            "DELETE FROM book_entity_field_revision WHERE vid = ?1;",
            [revision_id],
        )?;
        tx.execute(
            "DELETE FROM book_entity_revision WHERE vid = ?1;",
            [revision_id],
        )?;
        tx.commit()?;

        info!(
            "event=book_revision_delete module=repo status=ok entity_id={} revision_id={}",
            entity_id, revision_id
        );
        Ok(())
    }

    fn delete(&self, id: BookEntityId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if load_base_row(&tx, id)?.is_none() {
            return Err(RepoError::EntityNotFound(id));
        }

        tx.execute(
            "DELETE FROM book_entity_field_revision WHERE id = ?1;",
            [id],
        )?;
        let revisions = tx.execute("DELETE FROM book_entity_revision WHERE id = ?1;", [id])?;
        tx.execute("DELETE FROM book_entity_field_data WHERE id = ?1;", [id])?;
        tx.execute("DELETE FROM book_entity WHERE id = ?1;", [id])?;
        tx.commit()?;

        info!(
            "event=book_delete module=repo status=ok entity_id={} revisions={}",
            id, revisions
        );
        Ok(())
    }

    fn revision_ids(&self, id: BookEntityId) -> RepoResult<Vec<RevisionId>> {
        collect_ids(
            self.conn,
            "SELECT vid FROM book_entity_revision WHERE id = ?1 ORDER BY vid ASC;",
            params![id],
        )
    }

    fn user_revision_ids(&self, user_id: UserId) -> RepoResult<Vec<RevisionId>> {
        collect_ids(
            self.conn,
            "SELECT DISTINCT vid
             FROM book_entity_field_revision
             WHERE user_id = ?1
             ORDER BY vid ASC;",
            params![user_id],
        )
    }

    fn count_default_language_revisions(&self, id: BookEntityId) -> RepoResult<u64> {
        count_default_language_rows(self.conn, id)
    }

    fn count_revisions(&self, id: BookEntityId) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT vid) FROM book_entity_field_revision WHERE id = ?1;",
            [id],
            |row| row.get(0),
        )?;
        count_to_u64(count)
    }

    fn revision_ids_with_language(
        &self,
        id: BookEntityId,
        langcode: &str,
    ) -> RepoResult<Vec<RevisionId>> {
        language_carriers(self.conn, id, langcode)
    }

    fn translation_languages(&self, id: BookEntityId) -> RepoResult<Vec<String>> {
        if load_base_row(self.conn, id)?.is_none() {
            return Err(RepoError::EntityNotFound(id));
        }
        let mut stmt = self.conn.prepare(
            "SELECT langcode
             FROM book_entity_field_data
             WHERE id = ?1
             ORDER BY langcode ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut languages = Vec::new();
        while let Some(row) = rows.next()? {
            languages.push(row.get(0)?);
        }
        Ok(languages)
    }

    fn clear_revisions_language(&self, langcode: &str) -> RepoResult<usize> {
        if is_locked_langcode(langcode) {
            return Err(RepoError::InvalidOperation(format!(
                "language `{langcode}` cannot be cleared"
            )));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE book_entity_revision SET langcode = ?2 WHERE langcode = ?1;",
            params![langcode, LANGCODE_NOT_SPECIFIED],
        )?;
        // Rows whose (revision, und) or (entity, und) key already exists keep
        // their old code.
        tx.execute(
            "UPDATE OR IGNORE book_entity_field_revision SET langcode = ?2 WHERE langcode = ?1;",
            params![langcode, LANGCODE_NOT_SPECIFIED],
        )?;
        tx.execute(
            "UPDATE OR IGNORE book_entity_field_data SET langcode = ?2 WHERE langcode = ?1;",
            params![langcode, LANGCODE_NOT_SPECIFIED],
        )?;
        tx.execute(
            "UPDATE book_entity SET langcode = ?2 WHERE langcode = ?1;",
            params![langcode, LANGCODE_NOT_SPECIFIED],
        )?;
        tx.commit()?;

        info!(
            "event=book_clear_language module=repo status=ok langcode={} revisions={}",
            langcode, changed
        );
        Ok(changed)
    }

    fn list_entities(&self, query: &BookListQuery) -> RepoResult<Vec<BookSummary>> {
        let mut sql = String::from(
            "SELECT
                d.id,
                b.uuid,
                b.type,
                d.name,
                d.langcode,
                d.status,
                d.changed
             FROM book_entity_field_data d
             INNER JOIN book_entity b ON b.id = d.id
             WHERE d.default_langcode = 1",
        );
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(bundle) = query.bundle.as_ref() {
            sql.push_str(" AND b.type = ?");
            bind_values.push(Value::Text(bundle.clone()));
        }

        sql.push_str(" ORDER BY d.id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut summaries = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid_text: String = row.get("uuid")?;
            summaries.push(BookSummary {
                id: row.get("id")?,
                uuid: parse_uuid(&uuid_text)?,
                bundle: row.get("type")?,
                label: row.get("name")?,
                langcode: row.get("langcode")?,
                status: parse_flag(row.get("status")?, "status")?,
                changed: row.get("changed")?,
            });
        }
        Ok(summaries)
    }
}

struct BaseRow {
    id: BookEntityId,
    vid: Option<RevisionId>,
    bundle: String,
    uuid: Uuid,
}

impl BaseRow {
    fn default_vid(&self) -> RepoResult<RevisionId> {
        self.vid.ok_or_else(|| {
            RepoError::InvalidData(format!("book entity {} has no default revision", self.id))
        })
    }
}

struct RevisionMeta {
    created: i64,
    author_id: Option<UserId>,
    log_message: String,
}

struct FieldRow {
    translation: BookTranslation,
    status: bool,
    created: i64,
    changed: i64,
    default_langcode: bool,
}

impl FieldRow {
    fn snapshot(&self) -> TranslationSnapshot<'_> {
        TranslationSnapshot {
            translation: &self.translation,
            status: self.status,
            created: self.created,
        }
    }
}

fn load_base_row(conn: &Connection, id: BookEntityId) -> RepoResult<Option<BaseRow>> {
    let row = conn
        .query_row(
            "SELECT id, vid, type, uuid FROM book_entity WHERE id = ?1;",
            [id],
            |row| {
                Ok((
                    row.get::<_, BookEntityId>("id")?,
                    row.get::<_, Option<RevisionId>>("vid")?,
                    row.get::<_, String>("type")?,
                    row.get::<_, String>("uuid")?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, vid, bundle, uuid_text)) => Ok(Some(BaseRow {
            id,
            vid,
            bundle,
            uuid: parse_uuid(&uuid_text)?,
        })),
        None => Ok(None),
    }
}

fn revision_entity_id(
    conn: &Connection,
    revision_id: RevisionId,
) -> RepoResult<Option<BookEntityId>> {
    let id = conn
        .query_row(
            "SELECT id FROM book_entity_revision WHERE vid = ?1;",
            [revision_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn load_revision_meta(conn: &Connection, vid: RevisionId) -> RepoResult<Option<RevisionMeta>> {
    let meta = conn
        .query_row(
            "SELECT revision_created, revision_user, revision_log_message
             FROM book_entity_revision
             WHERE vid = ?1;",
            [vid],
            |row| {
                Ok(RevisionMeta {
                    created: row.get("revision_created")?,
                    author_id: row.get("revision_user")?,
                    log_message: row.get("revision_log_message")?,
                })
            },
        )
        .optional()?;
    Ok(meta)
}

fn bundle_exists(conn: &Connection, bundle: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM book_entity_type WHERE id = ?1);",
        [bundle],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn load_field_rows(
    conn: &Connection,
    table: &'static str,
    key_column: &'static str,
    key: i64,
) -> RepoResult<Vec<FieldRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FIELD_ROW_COLUMNS}
         FROM {table}
         WHERE {key_column} = ?1
         ORDER BY langcode ASC;"
    ))?;
    let mut rows = stmt.query([key])?;
    let mut parsed = Vec::new();
    while let Some(row) = rows.next()? {
        parsed.push(parse_field_row(row)?);
    }
    Ok(parsed)
}

fn load_previous_translation(
    conn: &Connection,
    entity_id: BookEntityId,
    langcode: &str,
    before_vid: RevisionId,
) -> RepoResult<Option<FieldRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FIELD_ROW_COLUMNS}
         FROM book_entity_field_revision
         WHERE id = ?1
           AND langcode = ?2
           AND vid < ?3
         ORDER BY vid DESC
         LIMIT 1;"
    ))?;
    let mut rows = stmt.query(params![entity_id, langcode, before_vid])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_field_row(row)?)),
        None => Ok(None),
    }
}

fn carry_forward_translations(
    conn: &Connection,
    entity: &mut BookEntity,
    previous_vid: RevisionId,
) -> RepoResult<()> {
    let rows = load_field_rows(conn, "book_entity_field_revision", "vid", previous_vid)?;
    for row in rows {
        let langcode = row.translation.langcode.as_str();
        if entity.has_translation(langcode) || entity.removed_translations().contains(langcode) {
            continue;
        }
        entity.insert_translation_unchecked(row.translation);
    }
    Ok(())
}

fn assemble_entity(
    conn: &Connection,
    base: &BaseRow,
    vid: RevisionId,
    rows: Vec<FieldRow>,
) -> RepoResult<BookEntity> {
    let meta = load_revision_meta(conn, vid)?.ok_or(RepoError::RevisionNotFound(vid))?;
    let default_row = rows
        .iter()
        .find(|row| row.default_langcode)
        .ok_or_else(|| {
            RepoError::InvalidData(format!(
                "revision {vid} of book entity {} has no default language row",
                base.id
            ))
        })?;
    let default_langcode = default_row.translation.langcode.clone();
    let status = default_row.status;
    let created = default_row.created;
    let changed = default_row.changed;

    let translations: BTreeMap<String, BookTranslation> = rows
        .into_iter()
        .map(|row| (row.translation.langcode.clone(), row.translation))
        .collect();

    let revision = Revision {
        revision_id: Some(vid),
        created: meta.created,
        author_id: meta.author_id,
        log_message: meta.log_message,
        is_default: base.vid == Some(vid),
    };

    let entity = BookEntity::from_storage(
        base.id,
        base.uuid,
        base.bundle.clone(),
        default_langcode,
        status,
        created,
        changed,
        revision,
        translations,
    );
    entity.validate()?;
    Ok(entity)
}

fn insert_field_row(
    conn: &Connection,
    table: &'static str,
    entity: &BookEntity,
    entity_id: BookEntityId,
    vid: RevisionId,
    translation: &BookTranslation,
) -> RepoResult<()> {
    let type_column = if table == "book_entity_field_data" {
        ", type"
    } else {
        ""
    };
    let type_placeholder = if table == "book_entity_field_data" {
        ", ?14"
    } else {
        ""
    };
    let sql = format!(
        "INSERT INTO {table} (
            {FIELD_ROW_COLUMNS}{type_column}
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13{type_placeholder});"
    );

    let mut values: Vec<Value> = vec![
        Value::Integer(entity_id),
        Value::Integer(vid),
        Value::Text(translation.langcode.clone()),
        Value::Integer(translation.owner_id.unwrap_or(ANONYMOUS_USER_ID)),
        Value::Text(translation.name.clone()),
        Value::Integer(translation.isbn),
        Value::Text(translation.author.clone()),
        Value::Real(translation.price),
        Value::Integer(bool_to_int(entity.status)),
        Value::Integer(entity.created),
        Value::Integer(entity.changed),
        Value::Integer(bool_to_int(translation.is_revision_translation_affected())),
        Value::Integer(bool_to_int(translation.langcode == entity.default_langcode)),
    ];
    if table == "book_entity_field_data" {
        values.push(Value::Text(entity.bundle.clone()));
    }

    conn.execute(&sql, params_from_iter(values))?;
    Ok(())
}

fn parse_field_row(row: &Row<'_>) -> RepoResult<FieldRow> {
    let mut translation = BookTranslation::new(
        row.get::<_, String>("langcode")?,
        row.get::<_, String>("name")?,
        row.get("isbn")?,
        row.get::<_, String>("author")?,
        row.get("price")?,
    );
    translation.owner_id = Some(row.get("user_id")?);
    translation.set_revision_translation_affected(parse_flag(
        row.get("revision_translation_affected")?,
        "revision_translation_affected",
    )?);

    Ok(FieldRow {
        translation,
        status: parse_flag(row.get("status")?, "status")?,
        created: row.get("created")?,
        changed: row.get("changed")?,
        default_langcode: parse_flag(row.get("default_langcode")?, "default_langcode")?,
    })
}

/// Rejects deleting the default revision, the last default language
/// revision row, or the only stored copy of a language.
fn check_revision_deletable(
    conn: &Connection,
    base: &BaseRow,
    revision_id: RevisionId,
) -> RepoResult<()> {
    let entity_id = base.id;
    if base.vid == Some(revision_id) {
        return Err(RepoError::InvalidOperation(format!(
            "revision {revision_id} is the default revision of book entity {entity_id}"
        )));
    }
    if count_default_language_rows(conn, entity_id)? <= 1 {
        return Err(RepoError::InvalidOperation(format!(
            "book entity {entity_id} has only one default language revision"
        )));
    }

    let mut stmt = conn.prepare(
        "SELECT langcode
         FROM book_entity_field_revision
         WHERE vid = ?1
         ORDER BY langcode ASC;",
    )?;
    let languages = stmt
        .query_map([revision_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    for langcode in languages {
        if language_carriers(conn, entity_id, &langcode)? == [revision_id] {
            return Err(RepoError::InvalidOperation(format!(
                "revision {revision_id} holds the last copy of language `{langcode}`"
            )));
        }
    }
    Ok(())
}

fn count_default_language_rows(conn: &Connection, id: BookEntityId) -> RepoResult<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*)
         FROM book_entity_field_revision
         WHERE id = ?1
           AND default_langcode = 1;",
        [id],
        |row| row.get(0),
    )?;
    count_to_u64(count)
}

fn language_carriers(
    conn: &Connection,
    id: BookEntityId,
    langcode: &str,
) -> RepoResult<Vec<RevisionId>> {
    collect_ids(
        conn,
        "SELECT vid
         FROM book_entity_field_revision
         WHERE id = ?1
           AND langcode = ?2
         ORDER BY vid ASC;",
        params![id, langcode],
    )
}

fn collect_ids(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> RepoResult<Vec<RevisionId>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(row.get(0)?);
    }
    Ok(ids)
}

fn parse_uuid(value: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{value}` in book_entity.uuid"))
    })
}

fn parse_flag(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!("invalid {column} value `{other}`"))),
    }
}

fn count_to_u64(count: i64) -> RepoResult<u64> {
    u64::try_from(count).map_err(|_| RepoError::InvalidData(format!("negative count `{count}`")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn ensure_book_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}
