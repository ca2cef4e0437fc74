//! Repository layer contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define one store trait per table family.
//! - Isolate SQL details from command handlers.
//!
//! # Invariants
//! - Stores borrow a migrated connection and hold no state of their own.
//! - Store APIs return semantic errors (collision, not found, not member,
//!   not holder, conflict) in addition to DB transport errors.

pub mod boon_repo;
pub mod domain_repo;
pub mod feeding_repo;
