//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into transaction-level APIs.
//! - Keep callers decoupled from storage details.

pub mod conf_service;
pub mod diary_service;
pub mod plugin_service;
