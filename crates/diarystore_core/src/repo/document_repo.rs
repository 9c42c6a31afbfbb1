//! Document repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide upsert/find/find-all/delete over `(collection, key)` addressed
//!   JSON documents.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - A `(collection, key)` pair maps to at most one document at rest.
//! - Every single-document write is one SQL statement, so it either fully
//!   applies or not at all.
//! - Busy/locked/unreachable backends surface as `StorageUnavailable`.

use crate::db::{is_unavailable_sqlite_error, DbError};
use rusqlite::{params, Connection};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for document persistence and mapping.
#[derive(Debug)]
pub enum RepoError {
    /// Backend could not be reached or stayed locked past the busy timeout.
    StorageUnavailable(DbError),
    /// Any other backend failure.
    Db(DbError),
    /// A persisted document does not match the expected shape.
    InvalidData(String),
    /// Collection, key or namespace name rejected before touching storage.
    InvalidKey(String),
    /// Some documents of a multi-document commit were written, some were not.
    PartialWrite {
        failed: Vec<String>,
        written: Vec<String>,
    },
    /// Every document of a commit failed; `source` is the first failure.
    WriteFailed {
        failed: Vec<String>,
        source: Box<RepoError>,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StorageUnavailable(err) => write!(f, "storage unavailable: {err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted document: {message}"),
            Self::InvalidKey(message) => write!(f, "invalid document key: {message}"),
            Self::PartialWrite { failed, written } => write!(
                f,
                "partial write: {} document(s) failed [{}], {} written",
                failed.len(),
                failed.join(", "),
                written.len()
            ),
            Self::WriteFailed { failed, source } => write!(
                f,
                "write failed for [{}]: {source}",
                failed.join(", ")
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageUnavailable(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::WriteFailed { source, .. } => Some(source.as_ref()),
            Self::InvalidData(_) | Self::InvalidKey(_) | Self::PartialWrite { .. } => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        if value.is_unavailable() {
            Self::StorageUnavailable(value)
        } else {
            Self::Db(value)
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if is_unavailable_sqlite_error(&value) {
            Self::StorageUnavailable(DbError::Sqlite(value))
        } else {
            Self::Db(DbError::Sqlite(value))
        }
    }
}

impl RepoError {
    /// True when the backing store could not be reached, including commits
    /// where every write failed for that reason.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::StorageUnavailable(_) => true,
            Self::WriteFailed { source, .. } => source.is_unavailable(),
            _ => false,
        }
    }
}

/// One document returned by [`DocumentRepository::find_all`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub key: String,
    pub body: Value,
}

/// Inclusive key interval used to select documents within a collection.
///
/// Open ends are expressed with `None`. Keys compare as plain strings, so
/// fixed-width keys such as `YYYYMMDD` dates order chronologically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl KeyRange {
    /// Matches every key in the collection.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches exactly one key.
    pub fn exact(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            start: Some(key.clone()),
            end: Some(key),
        }
    }

    /// Matches keys in `start..=end`.
    pub fn between(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.start.as_deref().map_or(true, |start| key >= start)
            && self.end.as_deref().map_or(true, |end| key <= end)
    }
}

/// Repository interface for the document store adapter.
pub trait DocumentRepository {
    /// Inserts `document` or fully replaces the one stored under `key`.
    fn upsert(&self, collection: &str, key: &str, document: &Value) -> RepoResult<()>;
    /// Gets one document; a missing document is `Ok(None)`.
    fn find(&self, collection: &str, key: &str) -> RepoResult<Option<Value>>;
    /// Lists documents whose key falls in `range`, ordered by key.
    fn find_all(&self, collection: &str, range: &KeyRange) -> RepoResult<Vec<StoredDocument>>;
    /// Deletes one document. Returns whether a document was removed.
    fn delete(&self, collection: &str, key: &str) -> RepoResult<bool>;
    /// Lists all keys in a collection, ordered by key.
    fn keys(&self, collection: &str) -> RepoResult<Vec<String>>;
}

/// SQLite-backed document repository over the `documents` table.
#[derive(Clone, Copy)]
pub struct SqliteDocumentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentRepository<'conn> {
    /// Wraps a migrated connection returned by `db::open_db*`.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl DocumentRepository for SqliteDocumentRepository<'_> {
    fn upsert(&self, collection: &str, key: &str, document: &Value) -> RepoResult<()> {
        validate_collection(collection)?;
        let body = serde_json::to_string(document).map_err(|err| {
            RepoError::InvalidData(format!("cannot encode `{collection}/{key}`: {err}"))
        })?;

        self.conn.execute(
            "INSERT INTO documents (collection, doc_key, body)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (collection, doc_key) DO UPDATE SET
                body = excluded.body;",
            params![collection, key, body],
        )?;
        Ok(())
    }

    fn find(&self, collection: &str, key: &str) -> RepoResult<Option<Value>> {
        validate_collection(collection)?;
        let mut stmt = self.conn.prepare(
            "SELECT body
             FROM documents
             WHERE collection = ?1 AND doc_key = ?2;",
        )?;

        let mut rows = stmt.query(params![collection, key])?;
        if let Some(row) = rows.next()? {
            let body: String = row.get("body")?;
            return Ok(Some(parse_body(collection, key, &body)?));
        }

        Ok(None)
    }

    fn find_all(&self, collection: &str, range: &KeyRange) -> RepoResult<Vec<StoredDocument>> {
        validate_collection(collection)?;
        let mut stmt = self.conn.prepare(
            "SELECT doc_key, body
             FROM documents
             WHERE collection = ?1
               AND (?2 IS NULL OR doc_key >= ?2)
               AND (?3 IS NULL OR doc_key <= ?3)
             ORDER BY doc_key ASC;",
        )?;

        let mut rows = stmt.query(params![
            collection,
            range.start.as_deref(),
            range.end.as_deref()
        ])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let key: String = row.get("doc_key")?;
            let body: String = row.get("body")?;
            let body = parse_body(collection, &key, &body)?;
            documents.push(StoredDocument { key, body });
        }

        Ok(documents)
    }

    fn delete(&self, collection: &str, key: &str) -> RepoResult<bool> {
        validate_collection(collection)?;
        let changed = self.conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND doc_key = ?2;",
            params![collection, key],
        )?;
        Ok(changed > 0)
    }

    fn keys(&self, collection: &str) -> RepoResult<Vec<String>> {
        validate_collection(collection)?;
        let mut stmt = self.conn.prepare(
            "SELECT doc_key
             FROM documents
             WHERE collection = ?1
             ORDER BY doc_key ASC;",
        )?;
        let mut rows = stmt.query([collection])?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next()? {
            keys.push(row.get(0)?);
        }
        Ok(keys)
    }
}

fn validate_collection(collection: &str) -> RepoResult<()> {
    if collection.trim().is_empty() {
        return Err(RepoError::InvalidKey(
            "collection name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn parse_body(collection: &str, key: &str, body: &str) -> RepoResult<Value> {
    serde_json::from_str(body).map_err(|err| {
        RepoError::InvalidData(format!("document `{collection}/{key}` is not valid JSON: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::{KeyRange, RepoError};
    use crate::db::DbError;

    #[test]
    fn key_range_contains_is_inclusive() {
        let range = KeyRange::between("20240101", "20240131");
        assert!(range.contains("20240101"));
        assert!(range.contains("20240115"));
        assert!(range.contains("20240131"));
        assert!(!range.contains("20240201"));
        assert!(!range.contains("20231231"));
    }

    #[test]
    fn open_key_range_matches_everything() {
        let range = KeyRange::all();
        assert!(range.contains(""));
        assert!(range.contains("zzz"));
    }

    #[test]
    fn busy_errors_map_to_storage_unavailable() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(RepoError::from(busy).is_unavailable());

        let constraint = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            None,
        );
        assert!(matches!(
            RepoError::from(constraint),
            RepoError::Db(DbError::Sqlite(_))
        ));
    }
}
