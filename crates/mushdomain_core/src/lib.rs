//! Core logic for mushdomain: player territories and the boon ledger.
//! This crate is the single source of truth for ownership and ledger
//! invariants; callers only supply a command name and parameters.

pub mod command;
pub mod db;
pub mod encode;
pub mod logging;
pub mod model;
pub mod repo;

pub use command::{
    CommandError, CommandRegistry, CommandRouter, Dispatch, ErrorClass, InvocationState, Params,
    Reply,
};
pub use encode::{decode, encode, encode_fragments};
pub use logging::{
    default_log_level, init_logging, init_stderr_logging, logging_status, LogTarget,
};
pub use model::boon::{Boon, BoonEntry, BoonId, BoonListing, BoonTransfer, NewBoon};
pub use model::domain::{
    Domain, DomainBundle, DomainDetail, DomainId, DomainSecurity, FeedingPreference,
};
pub use repo::boon_repo::{BoonError, BoonLedger, BoonResult, SqliteBoonLedger};
pub use repo::domain_repo::{DomainError, DomainResult, DomainStore, SqliteDomainStore};
pub use repo::feeding_repo::{FeedingStore, SqliteFeedingStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
