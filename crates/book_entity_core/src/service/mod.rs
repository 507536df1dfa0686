//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into access-checked use-case APIs.
//! - Build presentation-neutral read models such as the revision timeline.

pub mod book_service;
pub mod history;
