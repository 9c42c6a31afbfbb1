//! Domain model for persisted diaries.
//!
//! # Responsibility
//! - Define canonical data structures used by the transaction services.
//!
//! # Invariants
//! - Every diary is identified by its `DiaryDate`.
//! - Comments have no identity outside their owning diary.

pub mod diary;
