//! Boon (favor/debt) ledger records.
//!
//! # Invariants
//! - `holder` starts equal to `to` and only changes through a recorded
//!   transfer.
//! - `acknowledged` and `validated` are monotonic: once set they stay set.
//! - A boon can be deleted only while both flags are still `false`.

use serde::{Deserialize, Serialize};

/// Row id of a boon in `boons.idBoons`.
pub type BoonId = i64;

/// A favor owed by `from` and currently held by `holder`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boon {
    pub id: BoonId,
    pub magnitude: f64,
    pub from: String,
    pub to: String,
    pub holder: String,
    pub acknowledged: bool,
    pub validated: bool,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub private: bool,
}

/// Input for creating a boon.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBoon {
    pub from: String,
    pub to: String,
    pub magnitude: f64,
    pub validated: bool,
    pub acknowledged: bool,
    pub private: bool,
    /// Overrides the creation time (epoch ms); `None` means now.
    pub created_at: Option<i64>,
}

impl NewBoon {
    /// Creates an unvalidated, unacknowledged, public boon stamped with now.
    pub fn new(from: impl Into<String>, to: impl Into<String>, magnitude: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            magnitude,
            validated: false,
            acknowledged: false,
            private: false,
            created_at: None,
        }
    }
}

/// One line of a boon listing, seen from the listing actor's side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoonEntry {
    pub id: BoonId,
    /// The debtor for owed entries, the current holder for owing entries.
    pub counterparty: String,
    pub magnitude: f64,
    pub acknowledged: bool,
    pub validated: bool,
    pub created_at: i64,
}

/// Both sides of an actor's ledger, each ordered by creation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoonListing {
    /// Boons the actor currently holds.
    pub owed: Vec<BoonEntry>,
    /// Boons the actor originally granted.
    pub owing: Vec<BoonEntry>,
}

/// Append-only audit record of one holder change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoonTransfer {
    pub boon_id: BoonId,
    pub from: String,
    pub to: String,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}
