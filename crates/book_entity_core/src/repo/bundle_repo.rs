//! Bundle (book entity type) registry.
//!
//! # Invariants
//! - Bundle ids are unique and immutable; only labels change.
//! - A bundle referenced by any entity cannot be deleted.

use crate::model::bundle::BookEntityType;
use crate::repo::book_repo::{ensure_book_connection_ready, RepoError, RepoResult};
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};

/// Repository interface for bundle registry operations.
pub trait BundleRepository {
    fn create_bundle(&self, bundle: &BookEntityType) -> RepoResult<()>;
    /// Updates the label of an existing bundle.
    fn update_bundle(&self, bundle: &BookEntityType) -> RepoResult<()>;
    fn get_bundle(&self, id: &str) -> RepoResult<Option<BookEntityType>>;
    /// Lists bundles ordered by label, then id.
    fn list_bundles(&self) -> RepoResult<Vec<BookEntityType>>;
    fn delete_bundle(&self, id: &str) -> RepoResult<()>;
    /// Number of entities of one bundle.
    fn count_entities(&self, id: &str) -> RepoResult<u64>;
}

/// SQLite-backed bundle registry.
pub struct SqliteBundleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBundleRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_book_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl BundleRepository for SqliteBundleRepository<'_> {
    fn create_bundle(&self, bundle: &BookEntityType) -> RepoResult<()> {
        bundle.validate()?;
        if self.get_bundle(&bundle.id)?.is_some() {
            return Err(RepoError::DuplicateBundle(bundle.id.clone()));
        }
        self.conn.execute(
            "INSERT INTO book_entity_type (id, label) VALUES (?1, ?2);",
            params![bundle.id.as_str(), bundle.label.as_str()],
        )?;
        info!(
            "event=bundle_create module=repo status=ok bundle={}",
            bundle.id
        );
        Ok(())
    }

    fn update_bundle(&self, bundle: &BookEntityType) -> RepoResult<()> {
        bundle.validate()?;
        let changed = self.conn.execute(
            "UPDATE book_entity_type SET label = ?2 WHERE id = ?1;",
            params![bundle.id.as_str(), bundle.label.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::BundleNotFound(bundle.id.clone()));
        }
        Ok(())
    }

    fn get_bundle(&self, id: &str) -> RepoResult<Option<BookEntityType>> {
        let bundle = self
            .conn
            .query_row(
                "SELECT id, label FROM book_entity_type WHERE id = ?1;",
                [id],
                |row| {
                    Ok(BookEntityType {
                        id: row.get("id")?,
                        label: row.get("label")?,
                    })
                },
            )
            .optional()?;
        Ok(bundle)
    }

    fn list_bundles(&self) -> RepoResult<Vec<BookEntityType>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, label
             FROM book_entity_type
             ORDER BY label ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut bundles = Vec::new();
        while let Some(row) = rows.next()? {
            bundles.push(BookEntityType {
                id: row.get("id")?,
                label: row.get("label")?,
            });
        }
        Ok(bundles)
    }

    fn delete_bundle(&self, id: &str) -> RepoResult<()> {
        let in_use = self.count_entities(id)?;
        if in_use > 0 {
            warn!(
                "event=bundle_delete module=repo status=rejected bundle={} entities={}",
                id, in_use
            );
            return Err(RepoError::InvalidOperation(format!(
                "book entity type `{id}` is used by {in_use} entities"
            )));
        }
        let changed = self
            .conn
            .execute("DELETE FROM book_entity_type WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::BundleNotFound(id.to_string()));
        }
        info!("event=bundle_delete module=repo status=ok bundle={}", id);
        Ok(())
    }

    fn count_entities(&self, id: &str) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM book_entity WHERE type = ?1;",
            [id],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative count `{count}`")))
    }
}
