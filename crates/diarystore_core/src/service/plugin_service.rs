//! Plugin key/value storage service.
//!
//! # Responsibility
//! - Open plugin storage for a store context, or report it as disabled.
//! - Run a unit of work against one plugin's isolated namespace.
//!
//! # Invariants
//! - Each plugin name maps to its own collection; keys never leak across.
//! - Writes apply immediately; there is no rollback on unit-of-work errors.
//! - Disabled storage behaves as an always-empty store that drops writes.

use crate::context::StoreContext;
use crate::repo::document_repo::{
    DocumentRepository, RepoError, RepoResult, SqliteDocumentRepository,
};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::time::Instant;

const PLUGIN_COLLECTION_PREFIX: &str = "plugin:";
const VALUE_FIELD: &str = "value";

static PLUGIN_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("valid plugin name regex"));

/// Opened plugin storage handle.
pub struct PluginStorage<R: DocumentRepository> {
    repo: R,
}

impl<'conn> PluginStorage<SqliteDocumentRepository<'conn>> {
    /// Opens plugin storage for `context`.
    ///
    /// Returns `None` when the context has no backing store, which callers
    /// treat as "storage disabled" rather than as a failure.
    pub fn open(context: &StoreContext<'conn>) -> Option<Self> {
        let storage = context.repository().map(Self::with_repository);
        debug!(
            "event=plugin_open module=service status=ok enabled={}",
            storage.is_some()
        );
        storage
    }
}

impl<R: DocumentRepository> PluginStorage<R> {
    /// Wraps an arbitrary document repository.
    pub fn with_repository(repo: R) -> Self {
        Self { repo }
    }

    /// Releases the handle.
    pub fn close(self) {
        debug!("event=plugin_close module=service status=ok");
    }
}

/// Closes an optional storage handle; a no-op for disabled storage.
pub fn close_storage<R: DocumentRepository>(storage: Option<PluginStorage<R>>) {
    if let Some(storage) = storage {
        storage.close();
    }
}

/// Key/value view over one plugin namespace, handed to a unit of work.
pub struct PluginDb<'a> {
    collection: String,
    repo: Option<&'a dyn DocumentRepository>,
}

impl PluginDb<'_> {
    /// Namespace collection backing this view.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Whether writes through this view are persisted.
    pub fn is_persistent(&self) -> bool {
        self.repo.is_some()
    }

    /// Returns the stored value, or `None` when the key is absent.
    pub fn get(&self, key: &str) -> RepoResult<Option<String>> {
        let Some(repo) = self.repo else {
            return Ok(None);
        };
        match repo.find(&self.collection, key)? {
            Some(document) => match document.get(VALUE_FIELD) {
                Some(Value::String(value)) => Ok(Some(value.clone())),
                _ => Err(RepoError::InvalidData(format!(
                    "plugin value `{}/{key}` is not a string",
                    self.collection
                ))),
            },
            None => Ok(None),
        }
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&self, key: &str, value: &str) -> RepoResult<()> {
        let Some(repo) = self.repo else {
            return Ok(());
        };
        repo.upsert(&self.collection, key, &json!({ VALUE_FIELD: value }))
    }

    /// Removes `key`; removing an absent key succeeds.
    pub fn delete(&self, key: &str) -> RepoResult<()> {
        let Some(repo) = self.repo else {
            return Ok(());
        };
        repo.delete(&self.collection, key)?;
        Ok(())
    }

    /// Lists every key currently stored in the namespace. Order is not part
    /// of the contract.
    pub fn keys(&self) -> RepoResult<Vec<String>> {
        let Some(repo) = self.repo else {
            return Ok(Vec::new());
        };
        repo.keys(&self.collection)
    }
}

/// Runs `unit_of_work` against the namespace of `plugin_name`.
///
/// With `storage == None` the unit of work still runs, against a detached
/// view that is always empty and discards writes.
///
/// # Errors
/// - `RepoError::InvalidKey` when `plugin_name` is empty or contains
///   characters outside `[A-Za-z0-9_.-]`.
/// - Any error returned by `unit_of_work`, unchanged. Writes it already
///   issued stay applied.
pub fn plugin_transaction<R, T, E, F>(
    storage: Option<&PluginStorage<R>>,
    plugin_name: &str,
    unit_of_work: F,
) -> Result<T, E>
where
    R: DocumentRepository,
    F: FnOnce(&PluginDb<'_>) -> Result<T, E>,
    E: From<RepoError>,
{
    if !PLUGIN_NAME_RE.is_match(plugin_name) {
        return Err(RepoError::InvalidKey(format!("invalid plugin name `{plugin_name}`")).into());
    }

    let started_at = Instant::now();
    let db = PluginDb {
        collection: format!("{PLUGIN_COLLECTION_PREFIX}{plugin_name}"),
        repo: storage.map(|storage| &storage.repo as &dyn DocumentRepository),
    };

    let result = unit_of_work(&db);
    info!(
        "event=plugin_tx module=service status={} plugin={} persistent={} duration_ms={}",
        if result.is_ok() { "ok" } else { "error" },
        plugin_name,
        db.is_persistent(),
        started_at.elapsed().as_millis()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::{plugin_transaction, PluginStorage};
    use crate::repo::document_repo::{RepoError, SqliteDocumentRepository};

    #[test]
    fn detached_view_is_empty_and_drops_writes() {
        let result: Result<_, RepoError> = plugin_transaction(
            None::<&PluginStorage<SqliteDocumentRepository<'static>>>,
            "test_plugin",
            |db| {
                assert!(!db.is_persistent());
                db.set("k", "v")?;
                assert_eq!(db.get("k")?, None);
                db.delete("k")?;
                assert!(db.keys()?.is_empty());
                Ok(db.collection().to_string())
            },
        );
        assert_eq!(result.expect("detached transaction"), "plugin:test_plugin");
    }

    #[test]
    fn rejects_invalid_plugin_names() {
        for name in ["", "has space", "slash/name", "colon:name"] {
            let err = plugin_transaction(
                None::<&PluginStorage<SqliteDocumentRepository<'static>>>,
                name,
                |_| Ok::<_, RepoError>(()),
            )
            .expect_err("invalid name must fail");
            assert!(matches!(err, RepoError::InvalidKey(_)));
        }
    }
}
