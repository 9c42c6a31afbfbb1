use diarystore_core::db::open_db_in_memory;
use diarystore_core::service::conf_service::{CGI_CONF_KEY, CONF_COLLECTION};
use diarystore_core::{
    load_cgi_conf, save_cgi_conf, ConfService, DocumentRepository, RepoError,
    SqliteDocumentRepository, StoreContext,
};
use serde_json::json;

#[test]
fn load_before_save_is_empty() {
    let conn = open_db_in_memory().unwrap();
    let context = StoreContext::new(&conn);

    assert!(load_cgi_conf(&context).unwrap().is_empty());
}

#[test]
fn save_then_load_and_overwrite() {
    let conn = open_db_in_memory().unwrap();
    let context = StoreContext::new(&conn);

    save_cgi_conf(&context, "foo").unwrap();
    assert_eq!(load_cgi_conf(&context).unwrap(), "foo");

    save_cgi_conf(&context, "bar").unwrap();
    assert_eq!(load_cgi_conf(&context).unwrap(), "bar");

    let repo = SqliteDocumentRepository::new(&conn);
    assert_eq!(repo.keys(CONF_COLLECTION).unwrap(), vec![CGI_CONF_KEY]);
}

#[test]
fn detached_context_loads_empty_and_refuses_save() {
    let context = StoreContext::detached();

    assert!(load_cgi_conf(&context).unwrap().is_empty());
    let err = save_cgi_conf(&context, "foo").unwrap_err();
    assert!(err.is_unavailable());
}

#[test]
fn malformed_conf_document_is_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDocumentRepository::new(&conn);
    repo.upsert(CONF_COLLECTION, CGI_CONF_KEY, &json!({ "body": 1 }))
        .unwrap();

    let err = ConfService::new(repo).load().unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}
