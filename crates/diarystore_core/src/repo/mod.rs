//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the document store contract used by every service.
//! - Isolate SQLite and JSON mapping details from transaction orchestration.
//!
//! # Invariants
//! - Read paths reject malformed persisted documents instead of masking them.
//! - Missing documents are `Ok(None)` / empty lists, never errors.

pub mod diary_mapper;
pub mod document_repo;
