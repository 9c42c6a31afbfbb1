//! Diary transaction service.
//!
//! # Responsibility
//! - Load a window of diaries around a point in time.
//! - Run a caller unit of work over the loaded collection.
//! - Persist only what the returned `DirtyFlag` declares, and only for
//!   entries that differ from the pre-call snapshot.
//!
//! # Invariants
//! - `DirtyFlag::None` and unit-of-work errors write nothing.
//! - Dates dropped from the collection are never deleted implicitly.
//! - Under `DirtyFlag::Comment` only the comment array of a document changes.
//! - Earlier document writes are not rolled back when a later one fails.

use crate::context::StoreContext;
use crate::model::diary::{Diary, DiaryDate, DirtyFlag};
use crate::repo::diary_mapper::{self, DIARY_COLLECTION};
use crate::repo::document_repo::{
    DocumentRepository, KeyRange, RepoError, RepoResult, SqliteDocumentRepository,
};
use chrono::{Datelike, Months, Utc};
use log::{info, warn};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// Per-transaction mapping from date to diary handed to the unit of work.
pub type DiaryCollection = BTreeMap<DiaryDate, Diary>;

/// Policy deciding which dates a transaction loads for a point in time.
pub trait DiaryWindow {
    /// Returns the inclusive `(first, last)` date range.
    fn range(&self, point: DiaryDate) -> (DiaryDate, DiaryDate);
}

/// Loads exactly the date of the point in time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DayWindow;

impl DiaryWindow for DayWindow {
    fn range(&self, point: DiaryDate) -> (DiaryDate, DiaryDate) {
        (point, point)
    }
}

/// Loads the whole calendar month containing the point in time.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonthWindow;

impl DiaryWindow for MonthWindow {
    fn range(&self, point: DiaryDate) -> (DiaryDate, DiaryDate) {
        let date = point.date();
        // Both ends share the point's year, so they stay representable.
        let first = date
            .with_day(1)
            .and_then(|first| DiaryDate::try_from(first).ok())
            .unwrap_or(point);
        let last = first
            .date()
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .and_then(|last| DiaryDate::try_from(last).ok())
            .unwrap_or(point);
        (first, last)
    }
}

/// Outcome of a transaction that completed without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    pub flag: DirtyFlag,
    /// Dates whose documents were written, in date order.
    pub written: Vec<DiaryDate>,
}

impl CommitReport {
    /// True when the transaction wrote nothing.
    pub fn is_noop(&self) -> bool {
        self.written.is_empty()
    }
}

/// Transaction manager over diary documents.
pub struct DiaryService<R: DocumentRepository, W: DiaryWindow = DayWindow> {
    repo: R,
    window: W,
}

impl<'conn> DiaryService<SqliteDocumentRepository<'conn>, DayWindow> {
    /// Builds a day-window service over the context's store.
    ///
    /// A detached context is reported as `StorageUnavailable`.
    pub fn from_context(context: &StoreContext<'conn>) -> RepoResult<Self> {
        Ok(Self::new(context.require_repository()?))
    }
}

impl<R: DocumentRepository> DiaryService<R, DayWindow> {
    /// Creates a service loading exactly one day per transaction.
    pub fn new(repo: R) -> Self {
        Self::with_window(repo, DayWindow)
    }
}

impl<R: DocumentRepository, W: DiaryWindow> DiaryService<R, W> {
    /// Creates a service with an application-supplied windowing policy.
    pub fn with_window(repo: R, window: W) -> Self {
        Self { repo, window }
    }

    /// Loads every stored diary inside the window around `point`.
    pub fn load_window(&self, point: DiaryDate) -> RepoResult<DiaryCollection> {
        let (first, last) = self.window.range(point);
        let range = KeyRange::between(first.to_id(), last.to_id());
        let mut collection = DiaryCollection::new();
        for stored in self.repo.find_all(DIARY_COLLECTION, &range)? {
            let (date, diary) = diary_mapper::from_document(&stored.body)?;
            if date.to_id() != stored.key {
                return Err(RepoError::InvalidData(format!(
                    "diary stored under `{}` carries diary_id `{}`",
                    stored.key, date
                )));
            }
            collection.insert(date, diary);
        }
        Ok(collection)
    }

    /// Loads a single diary; `Ok(None)` when nothing is stored for `date`.
    pub fn load_diary(&self, date: DiaryDate) -> RepoResult<Option<Diary>> {
        match self.repo.find(DIARY_COLLECTION, &date.to_id())? {
            Some(document) => Ok(Some(diary_mapper::from_document(&document)?.1)),
            None => Ok(None),
        }
    }

    /// Runs one diary transaction.
    ///
    /// Loads the window around `point`, passes it to `unit_of_work`, then
    /// commits according to the returned flag. Errors from the unit of work
    /// are returned unchanged and nothing is written.
    ///
    /// # Errors
    /// - `RepoError::StorageUnavailable` / `InvalidData` from loading.
    /// - `RepoError::PartialWrite` when some but not all documents were
    ///   written; `written` lists the ones that stayed applied.
    /// - `RepoError::WriteFailed` when every changed document failed;
    ///   `failed` lists their dates and `source` holds the first cause.
    pub fn transaction<F, E>(
        &self,
        point: DiaryDate,
        unit_of_work: F,
    ) -> Result<CommitReport, E>
    where
        F: FnOnce(&mut DiaryCollection) -> Result<DirtyFlag, E>,
        E: From<RepoError>,
    {
        let started_at = Instant::now();
        let mut collection = self.load_window(point)?;
        let snapshot = collection.clone();

        let flag = match unit_of_work(&mut collection) {
            Ok(flag) => flag,
            Err(err) => {
                info!(
                    "event=diary_tx module=service status=aborted point={} loaded={} duration_ms={}",
                    point,
                    snapshot.len(),
                    started_at.elapsed().as_millis()
                );
                return Err(err);
            }
        };

        let written = match flag {
            DirtyFlag::None => Vec::new(),
            DirtyFlag::Diary => self.commit_diaries(&snapshot, &collection)?,
            DirtyFlag::Comment => self.commit_comments(&snapshot, &collection)?,
        };

        info!(
            "event=diary_tx module=service status=ok point={} flag={} loaded={} written={} duration_ms={}",
            point,
            flag.as_str(),
            snapshot.len(),
            written.len(),
            started_at.elapsed().as_millis()
        );
        Ok(CommitReport { flag, written })
    }

    /// Deletes the whole diary stored for `date`. Returns whether one existed.
    pub fn delete_diary(&self, date: DiaryDate) -> RepoResult<bool> {
        let deleted = self.repo.delete(DIARY_COLLECTION, &date.to_id())?;
        info!(
            "event=diary_delete module=service status=ok date={} deleted={}",
            date, deleted
        );
        Ok(deleted)
    }

    /// Returns years mapped to the months that hold at least one diary.
    pub fn calendar(&self) -> RepoResult<BTreeMap<i32, Vec<u32>>> {
        let mut months: BTreeMap<i32, BTreeSet<u32>> = BTreeMap::new();
        for key in self.repo.keys(DIARY_COLLECTION)? {
            let date = key
                .parse::<DiaryDate>()
                .map_err(|err| RepoError::InvalidData(err.to_string()))?;
            months.entry(date.year()).or_default().insert(date.month());
        }
        Ok(months
            .into_iter()
            .map(|(year, months)| (year, months.into_iter().collect()))
            .collect())
    }

    fn commit_diaries(
        &self,
        snapshot: &DiaryCollection,
        collection: &DiaryCollection,
    ) -> RepoResult<Vec<DiaryDate>> {
        let changed = collection
            .iter()
            .filter(|(date, diary)| snapshot.get(*date) != Some(*diary));
        self.write_each(changed, |date, diary, existing, now| {
            diary_mapper::to_document(date, diary, existing, now)
        })
    }

    fn commit_comments(
        &self,
        snapshot: &DiaryCollection,
        collection: &DiaryCollection,
    ) -> RepoResult<Vec<DiaryDate>> {
        let changed = collection.iter().filter(|(date, diary)| {
            let before = snapshot
                .get(*date)
                .map_or(&[][..], |previous| previous.comments.as_slice());
            before != diary.comments.as_slice()
        });
        self.write_each(changed, |date, diary, existing, now| {
            diary_mapper::comments_into_document(date, &diary.comments, existing, now)
        })
    }

    fn write_each<'a>(
        &self,
        changed: impl Iterator<Item = (&'a DiaryDate, &'a Diary)>,
        build: impl Fn(DiaryDate, &Diary, Option<&Value>, i64) -> Value,
    ) -> RepoResult<Vec<DiaryDate>> {
        let now = Utc::now().timestamp_millis();
        let mut written = Vec::new();
        let mut failed = Vec::new();
        let mut first_error = None;

        for (date, diary) in changed {
            let key = date.to_id();
            let result = self
                .repo
                .find(DIARY_COLLECTION, &key)
                .and_then(|existing| {
                    let document = build(*date, diary, existing.as_ref(), now);
                    self.repo.upsert(DIARY_COLLECTION, &key, &document)
                });

            match result {
                Ok(()) => written.push(*date),
                Err(err) => {
                    warn!(
                        "event=diary_write module=service status=error date={} error={}",
                        date, err
                    );
                    failed.push(key);
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            None => Ok(written),
            Some(err) if written.is_empty() => Err(RepoError::WriteFailed {
                failed,
                source: Box::new(err),
            }),
            Some(_) => Err(RepoError::PartialWrite {
                failed,
                written: written.iter().map(|date| date.to_id()).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DayWindow, DiaryWindow, MonthWindow};
    use crate::model::diary::DiaryDate;

    fn date(year: i32, month: u32, day: u32) -> DiaryDate {
        DiaryDate::from_ymd(year, month, day).expect("valid date")
    }

    #[test]
    fn day_window_is_the_point_itself() {
        let point = date(2024, 1, 31);
        assert_eq!(DayWindow.range(point), (point, point));
    }

    #[test]
    fn month_window_spans_calendar_month() {
        assert_eq!(
            MonthWindow.range(date(2024, 2, 14)),
            (date(2024, 2, 1), date(2024, 2, 29))
        );
        assert_eq!(
            MonthWindow.range(date(2023, 12, 31)),
            (date(2023, 12, 1), date(2023, 12, 31))
        );
    }
}
