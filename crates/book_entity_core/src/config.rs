//! Runtime configuration read from the process environment.
//!
//! # Responsibility
//! - Resolve database location, log settings and the default language.
//! - Open a migrated connection for the resolved database.
//!
//! # Invariants
//! - Blank environment values behave as if unset.
//! - `default_langcode` is always a normalized language code.

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::logging::{default_log_level, init_logging, LoggingError};
use crate::model::language::{normalize_langcode, LANGCODE_DEFAULT};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "BOOK_ENTITY_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "BOOK_ENTITY_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "BOOK_ENTITY_LOG_DIR";
pub const ENV_DEFAULT_LANGCODE: &str = "BOOK_ENTITY_DEFAULT_LANGCODE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// SQLite file; `None` keeps the store in memory.
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    /// Absolute log directory; file logging stays off when `None`.
    pub log_dir: Option<PathBuf>,
    pub default_langcode: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
            default_langcode: LANGCODE_DEFAULT.to_string(),
        }
    }
}

impl CoreConfig {
    /// Reads `BOOK_ENTITY_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    ///
    /// An invalid language code falls back to the default language.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Self {
            db_path: read(ENV_DB_PATH).map(PathBuf::from),
            log_level: read(ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_dir: read(ENV_LOG_DIR).map(PathBuf::from),
            default_langcode: read(ENV_DEFAULT_LANGCODE)
                .and_then(|value| normalize_langcode(&value))
                .unwrap_or(defaults.default_langcode),
        }
    }

    /// Opens the configured database with migrations applied.
    pub fn open_connection(&self) -> DbResult<Connection> {
        match self.db_path.as_ref() {
            Some(path) => open_db(path),
            None => open_db_in_memory(),
        }
    }

    /// Starts file logging when a log directory is configured.
    ///
    /// Returns `Ok(false)` when no directory is set.
    pub fn init_logging(&self) -> Result<bool, LoggingError> {
        let Some(log_dir) = self.log_dir.as_ref() else {
            return Ok(false);
        };
        init_logging(&self.log_level, &log_dir.to_string_lossy())?;
        Ok(true)
    }
}
