//! Store context threaded through every service entry point.
//!
//! # Responsibility
//! - Identify which backing store a call should use.
//! - Represent "storage disabled" explicitly instead of via global state.

use crate::db::DbError;
use crate::repo::document_repo::{RepoError, RepoResult, SqliteDocumentRepository};
use rusqlite::Connection;

/// Handle to the current application's backing store, if any.
#[derive(Clone, Copy, Default)]
pub struct StoreContext<'conn> {
    conn: Option<&'conn Connection>,
}

impl<'conn> StoreContext<'conn> {
    /// Context backed by a migrated connection.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn: Some(conn) }
    }

    /// Context with no backing store; plugin storage opens as disabled and
    /// config loads as empty.
    pub fn detached() -> Self {
        Self { conn: None }
    }

    /// Document repository over this context's connection, if attached.
    pub fn repository(&self) -> Option<SqliteDocumentRepository<'conn>> {
        self.conn.map(SqliteDocumentRepository::new)
    }

    /// Like [`Self::repository`] but reports a detached context as
    /// `StorageUnavailable`.
    pub fn require_repository(&self) -> RepoResult<SqliteDocumentRepository<'conn>> {
        self.repository()
            .ok_or(RepoError::StorageUnavailable(DbError::NoConnection))
    }
}
