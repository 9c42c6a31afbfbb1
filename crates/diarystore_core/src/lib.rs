//! Core persistence for diarystore.
//! This crate owns the diary transaction protocol and the plugin/config
//! stores layered over one SQLite-backed document store.

pub mod config;
pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::StoreConfig;
pub use context::StoreContext;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::diary::{Comment, Diary, DiaryDate, DiaryDateError, DiaryStyle, DirtyFlag};
pub use repo::document_repo::{
    DocumentRepository, KeyRange, RepoError, RepoResult, SqliteDocumentRepository, StoredDocument,
};
pub use service::conf_service::{load_cgi_conf, save_cgi_conf, ConfService};
pub use service::diary_service::{
    CommitReport, DayWindow, DiaryCollection, DiaryService, DiaryWindow, MonthWindow,
};
pub use service::plugin_service::{close_storage, plugin_transaction, PluginDb, PluginStorage};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
