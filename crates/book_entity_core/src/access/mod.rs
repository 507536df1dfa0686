//! Access control for book entity operations.
//!
//! # Responsibility
//! - Describe the current account as an explicit dependency.
//! - Map (operation, publication state, account) to an access decision.
//!
//! # Invariants
//! - The evaluator is pure: no storage access, no side effects.
//! - `Neutral` is never treated as a rejection.

pub mod account;
pub mod policy;
