//! CGI configuration blob service.
//!
//! # Responsibility
//! - Store and retrieve the singleton configuration blob of a store context.
//!
//! # Invariants
//! - `save` replaces the previous blob wholesale.
//! - `load` never reports "absent": a missing blob reads as empty.

use crate::context::StoreContext;
use crate::repo::document_repo::{DocumentRepository, RepoError, RepoResult};
use log::info;
use serde_json::{json, Value};

/// Collection holding configuration documents.
pub const CONF_COLLECTION: &str = "conf";
/// Fixed key of the CGI configuration document.
pub const CGI_CONF_KEY: &str = "cgi_conf";

const BODY_FIELD: &str = "body";

/// Configuration blob store over a document repository.
pub struct ConfService<R: DocumentRepository> {
    repo: R,
}

impl<R: DocumentRepository> ConfService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Returns the stored blob, or an empty string when none was saved.
    pub fn load(&self) -> RepoResult<String> {
        match self.repo.find(CONF_COLLECTION, CGI_CONF_KEY)? {
            Some(document) => match document.get(BODY_FIELD) {
                Some(Value::String(body)) => Ok(body.clone()),
                _ => Err(RepoError::InvalidData(format!(
                    "`{CONF_COLLECTION}/{CGI_CONF_KEY}` field `{BODY_FIELD}` is not a string"
                ))),
            },
            None => Ok(String::new()),
        }
    }

    /// Replaces the stored blob with `body`.
    pub fn save(&self, body: &str) -> RepoResult<()> {
        self.repo
            .upsert(CONF_COLLECTION, CGI_CONF_KEY, &json!({ BODY_FIELD: body }))?;
        info!(
            "event=conf_save module=service status=ok bytes={}",
            body.len()
        );
        Ok(())
    }
}

/// Loads the configuration blob of `context`; a detached context reads empty.
pub fn load_cgi_conf(context: &StoreContext<'_>) -> RepoResult<String> {
    match context.repository() {
        Some(repo) => ConfService::new(repo).load(),
        None => Ok(String::new()),
    }
}

/// Saves the configuration blob of `context`.
///
/// # Errors
/// - `RepoError::StorageUnavailable` when the context is detached.
pub fn save_cgi_conf(context: &StoreContext<'_>, body: &str) -> RepoResult<()> {
    ConfService::new(context.require_repository()?).save(body)
}
