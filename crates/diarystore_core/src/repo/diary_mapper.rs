//! Diary <-> document mapping.
//!
//! # Responsibility
//! - Convert diary entities to the persisted document shape and back.
//!
//! # Invariants
//! - `diary_id`, `title`, `body` and every comment's `name`/`mail`/`body`
//!   are written and read verbatim.
//! - Top-level fields the mapper does not own are kept when a document is
//!   rewritten on top of an existing one.
//! - Reading rejects documents missing a required field instead of
//!   defaulting it.

use crate::model::diary::{Comment, Diary, DiaryDate, DiaryStyle};
use crate::repo::document_repo::{RepoError, RepoResult};
use serde_json::{json, Map, Value};

/// Collection holding one document per diary date.
pub const DIARY_COLLECTION: &str = "diaries";

const FIELD_DIARY_ID: &str = "diary_id";
const FIELD_TITLE: &str = "title";
const FIELD_BODY: &str = "body";
const FIELD_COMMENTS: &str = "comments";
const FIELD_LAST_MODIFIED: &str = "last_modified";

/// Maps a full diary onto a document.
///
/// When `existing` is given its unknown fields survive; the mapped fields are
/// overwritten.
pub fn to_document(
    date: DiaryDate,
    style: &impl DiaryStyle,
    existing: Option<&Value>,
    modified_at_ms: i64,
) -> Value {
    let mut document = base_object(existing);
    document.insert(FIELD_DIARY_ID.to_string(), Value::String(date.to_id()));
    document.insert(
        FIELD_TITLE.to_string(),
        Value::String(style.title().to_string()),
    );
    document.insert(
        FIELD_BODY.to_string(),
        Value::String(style.body_source().to_string()),
    );
    document.insert(FIELD_COMMENTS.to_string(), comments_to_value(style.comments()));
    document.insert(FIELD_LAST_MODIFIED.to_string(), Value::from(modified_at_ms));
    Value::Object(document)
}

/// Replaces only the embedded comment array of a diary document.
///
/// Title and body of `existing` are left as stored. Without an existing
/// document a skeleton with empty title/body is produced so the comments
/// still have an owning diary.
pub fn comments_into_document(
    date: DiaryDate,
    comments: &[Comment],
    existing: Option<&Value>,
    modified_at_ms: i64,
) -> Value {
    let mut document = base_object(existing);
    document.insert(FIELD_DIARY_ID.to_string(), Value::String(date.to_id()));
    document
        .entry(FIELD_TITLE.to_string())
        .or_insert_with(|| Value::String(String::new()));
    document
        .entry(FIELD_BODY.to_string())
        .or_insert_with(|| Value::String(String::new()));
    document.insert(FIELD_COMMENTS.to_string(), comments_to_value(comments));
    document.insert(FIELD_LAST_MODIFIED.to_string(), Value::from(modified_at_ms));
    Value::Object(document)
}

/// Reads a diary back from its document.
pub fn from_document(document: &Value) -> RepoResult<(DiaryDate, Diary)> {
    let object = document
        .as_object()
        .ok_or_else(|| RepoError::InvalidData("diary document is not an object".to_string()))?;

    let diary_id = required_str(object, FIELD_DIARY_ID, "diary")?;
    let date = diary_id
        .parse::<DiaryDate>()
        .map_err(|err| RepoError::InvalidData(err.to_string()))?;

    let comments = match object.get(FIELD_COMMENTS) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| comment_from_value(diary_id, item))
            .collect::<RepoResult<Vec<_>>>()?,
        Some(_) => {
            return Err(RepoError::InvalidData(format!(
                "diary `{diary_id}` field `comments` is not an array"
            )));
        }
    };

    let diary = Diary {
        title: required_str(object, FIELD_TITLE, diary_id)?.to_string(),
        body: required_str(object, FIELD_BODY, diary_id)?.to_string(),
        comments,
    };
    Ok((date, diary))
}

/// Reads the `last_modified` metadata, if the document carries one.
pub fn last_modified(document: &Value) -> Option<i64> {
    document.get(FIELD_LAST_MODIFIED).and_then(Value::as_i64)
}

fn base_object(existing: Option<&Value>) -> Map<String, Value> {
    existing
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn comments_to_value(comments: &[Comment]) -> Value {
    Value::Array(
        comments
            .iter()
            .map(|comment| {
                json!({
                    "name": comment.name,
                    "mail": comment.mail,
                    "body": comment.body,
                })
            })
            .collect(),
    )
}

fn comment_from_value(diary_id: &str, value: &Value) -> RepoResult<Comment> {
    let object = value.as_object().ok_or_else(|| {
        RepoError::InvalidData(format!("diary `{diary_id}` has a non-object comment"))
    })?;
    let owner = format!("{diary_id} comment");
    Ok(Comment {
        name: required_str(object, "name", &owner)?.to_string(),
        mail: required_str(object, "mail", &owner)?.to_string(),
        body: required_str(object, "body", &owner)?.to_string(),
    })
}

fn required_str<'a>(
    object: &'a Map<String, Value>,
    field: &str,
    owner: &str,
) -> RepoResult<&'a str> {
    match object.get(field) {
        Some(Value::String(value)) => Ok(value.as_str()),
        Some(_) => Err(RepoError::InvalidData(format!(
            "`{owner}` field `{field}` is not a string"
        ))),
        None => Err(RepoError::InvalidData(format!(
            "`{owner}` is missing required field `{field}`"
        ))),
    }
}
