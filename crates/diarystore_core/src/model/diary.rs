//! Diary domain model.
//!
//! # Responsibility
//! - Define the plain data persisted per diary date.
//! - Define the capability trait through which rendering-side diary objects
//!   are read by the record mapper.
//!
//! # Invariants
//! - One `Diary` per `DiaryDate`; the date is the identity, not a field.
//! - Comment order is insertion order and is preserved verbatim.
//! - Entities carry no change-tracking state; diffs are computed by the
//!   transaction service against a snapshot.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const DIARY_ID_FORMAT: &str = "%Y%m%d";
const MIN_YEAR: i32 = 0;
const MAX_YEAR: i32 = 9999;

static DIARY_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{8}$").expect("valid diary id regex"));

/// Calendar date identifying one diary, rendered as `YYYYMMDD`.
///
/// Only years `0..=9999` are representable, so every id is exactly eight
/// digits and parses back to the same date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiaryDate(NaiveDate);

impl DiaryDate {
    /// Builds a date from calendar parts, `None` when the parts are invalid
    /// or the year has no eight-digit id.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).and_then(|date| Self::try_from(date).ok())
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }

    pub fn year(self) -> i32 {
        self.0.year()
    }

    pub fn month(self) -> u32 {
        self.0.month()
    }

    /// Returns the persisted `diary_id` form.
    pub fn to_id(self) -> String {
        self.0.format(DIARY_ID_FORMAT).to_string()
    }
}

impl TryFrom<NaiveDate> for DiaryDate {
    type Error = DiaryDateError;

    fn try_from(value: NaiveDate) -> Result<Self, Self::Error> {
        if (MIN_YEAR..=MAX_YEAR).contains(&value.year()) {
            Ok(Self(value))
        } else {
            Err(DiaryDateError(value.to_string()))
        }
    }
}

impl Display for DiaryDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(DIARY_ID_FORMAT))
    }
}

impl FromStr for DiaryDate {
    type Err = DiaryDateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if !DIARY_ID_RE.is_match(value) {
            return Err(DiaryDateError(value.to_string()));
        }
        NaiveDate::parse_from_str(value, DIARY_ID_FORMAT)
            .map(Self)
            .map_err(|_| DiaryDateError(value.to_string()))
    }
}

/// Raised when a `diary_id` string is not a valid `YYYYMMDD` date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiaryDateError(pub String);

impl Display for DiaryDateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid diary id `{}`; expected YYYYMMDD", self.0)
    }
}

impl Error for DiaryDateError {}

/// One reader comment attached to a diary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub name: String,
    pub mail: String,
    pub body: String,
}

impl Comment {
    pub fn new(name: impl Into<String>, mail: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mail: mail.into(),
            body: body.into(),
        }
    }
}

/// Read capability the mapper needs from a rendering-side diary object.
///
/// Style implementations parse and render the body; the core only reads the
/// raw source and never interprets it.
pub trait DiaryStyle {
    fn title(&self) -> &str;
    fn body_source(&self) -> &str;
    fn comments(&self) -> &[Comment];
}

/// Persisted diary entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diary {
    pub title: String,
    /// Unrendered markup as written by the author.
    pub body: String,
    pub comments: Vec<Comment>,
}

impl Diary {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            comments: Vec::new(),
        }
    }

    /// Copies the readable state out of any style object.
    pub fn from_style(style: &impl DiaryStyle) -> Self {
        Self {
            title: style.title().to_string(),
            body: style.body_source().to_string(),
            comments: style.comments().to_vec(),
        }
    }

    /// Appends a comment at the end of the display order.
    pub fn add_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    /// Iterates comments in display order, skipping the first `skip`.
    pub fn each_comment(&self, skip: usize) -> impl Iterator<Item = &Comment> {
        self.comments.iter().skip(skip)
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }
}

impl DiaryStyle for Diary {
    fn title(&self) -> &str {
        &self.title
    }

    fn body_source(&self) -> &str {
        &self.body
    }

    fn comments(&self) -> &[Comment] {
        &self.comments
    }
}

/// Caller-declared class of change returned by a diary unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirtyFlag {
    /// Discard in-memory changes; write nothing.
    None,
    /// Persist every new or changed diary in full.
    Diary,
    /// Persist only the comment sequence of changed diaries.
    Comment,
}

impl DirtyFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Diary => "diary",
            Self::Comment => "comment",
        }
    }
}
