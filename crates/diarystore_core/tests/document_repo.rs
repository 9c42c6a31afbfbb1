use diarystore_core::db::open_db_in_memory;
use diarystore_core::{DocumentRepository, KeyRange, RepoError, SqliteDocumentRepository};
use serde_json::json;

#[test]
fn upsert_then_find_returns_document() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDocumentRepository::new(&conn);

    repo.upsert("diaries", "20240131", &json!({ "title": "foo" }))
        .unwrap();

    let found = repo.find("diaries", "20240131").unwrap().unwrap();
    assert_eq!(found, json!({ "title": "foo" }));
}

#[test]
fn find_missing_document_is_none() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDocumentRepository::new(&conn);

    assert!(repo.find("diaries", "20240131").unwrap().is_none());
    assert!(repo.find_all("diaries", &KeyRange::all()).unwrap().is_empty());
}

#[test]
fn upsert_replaces_whole_document_without_duplicates() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDocumentRepository::new(&conn);

    repo.upsert("diaries", "20240131", &json!({ "title": "foo", "extra": 1 }))
        .unwrap();
    repo.upsert("diaries", "20240131", &json!({ "title": "bar" }))
        .unwrap();

    let all = repo.find_all("diaries", &KeyRange::all()).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].key, "20240131");
    assert_eq!(all[0].body, json!({ "title": "bar" }));
}

#[test]
fn collections_are_isolated() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDocumentRepository::new(&conn);

    repo.upsert("plugin:p1", "k", &json!({ "value": "a" })).unwrap();
    repo.upsert("plugin:p2", "k", &json!({ "value": "b" })).unwrap();

    assert_eq!(
        repo.find("plugin:p1", "k").unwrap(),
        Some(json!({ "value": "a" }))
    );
    assert_eq!(
        repo.find("plugin:p2", "k").unwrap(),
        Some(json!({ "value": "b" }))
    );
    assert_eq!(repo.keys("plugin:p1").unwrap(), vec!["k".to_string()]);
}

#[test]
fn find_all_filters_by_inclusive_key_range_in_key_order() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDocumentRepository::new(&conn);

    for key in ["20240201", "20240115", "20240131", "20240101", "20231231"] {
        repo.upsert("diaries", key, &json!({ "k": key })).unwrap();
    }

    let january = repo
        .find_all("diaries", &KeyRange::between("20240101", "20240131"))
        .unwrap();
    let keys: Vec<_> = january.iter().map(|doc| doc.key.as_str()).collect();
    assert_eq!(keys, vec!["20240101", "20240115", "20240131"]);

    let exact = repo
        .find_all("diaries", &KeyRange::exact("20240115"))
        .unwrap();
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].body, json!({ "k": "20240115" }));

    let open_ended = KeyRange {
        start: Some("20240131".to_string()),
        end: None,
    };
    assert_eq!(repo.find_all("diaries", &open_ended).unwrap().len(), 2);
}

#[test]
fn delete_is_idempotent_and_reports_removal() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDocumentRepository::new(&conn);

    repo.upsert("conf", "cgi_conf", &json!({ "body": "x" })).unwrap();

    assert!(repo.delete("conf", "cgi_conf").unwrap());
    assert!(!repo.delete("conf", "cgi_conf").unwrap());
    assert!(repo.find("conf", "cgi_conf").unwrap().is_none());
}

#[test]
fn empty_collection_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDocumentRepository::new(&conn);

    let err = repo.upsert("", "k", &json!({})).unwrap_err();
    assert!(matches!(err, RepoError::InvalidKey(_)));

    let err = repo.keys("  ").unwrap_err();
    assert!(matches!(err, RepoError::InvalidKey(_)));
}

#[test]
fn empty_key_is_an_ordinary_key() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDocumentRepository::new(&conn);

    repo.upsert("plugin:p", "", &json!({ "value": "blank" })).unwrap();
    assert_eq!(
        repo.find("plugin:p", "").unwrap(),
        Some(json!({ "value": "blank" }))
    );
    assert_eq!(repo.keys("plugin:p").unwrap(), vec![String::new()]);
    assert!(repo.delete("plugin:p", "").unwrap());
}

#[test]
fn corrupt_stored_json_is_reported_as_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO documents (collection, doc_key, body) VALUES ('diaries', '20240131', '{oops');",
        [],
    )
    .unwrap();
    let repo = SqliteDocumentRepository::new(&conn);

    let err = repo.find("diaries", "20240131").unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn locked_store_surfaces_storage_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locked.db");
    let config = diarystore_core::StoreConfig {
        busy_timeout_ms: 50,
    };

    let reader = diarystore_core::db::open_db_with_config(&path, &config).unwrap();
    let holder = diarystore_core::db::open_db_with_config(&path, &config).unwrap();
    holder.execute_batch("BEGIN EXCLUSIVE;").unwrap();

    let repo = SqliteDocumentRepository::new(&reader);
    let err = repo.upsert("diaries", "20240131", &json!({})).unwrap_err();
    assert!(err.is_unavailable(), "unexpected error: {err}");
}
