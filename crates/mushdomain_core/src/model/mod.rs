//! Record types for territories and the boon ledger.
//!
//! # Responsibility
//! - Define the read models returned by the stores.
//! - Keep typed fields (numeric magnitude, boolean flags) at the boundary so
//!   no caller compares `"1"` against `1`.
//!
//! # Invariants
//! - Records are snapshots; the store is the only authority and every read
//!   re-queries it.

pub mod boon;
pub mod domain;

/// Characters that separate records, fields, items and sections in
/// composite replies. Stored text may not contain them.
pub const WIRE_DELIMITERS: [char; 5] = ['|', '~', '*', '^', '>'];

/// First reply delimiter found in `value`, if any.
pub fn find_wire_delimiter(value: &str) -> Option<char> {
    value.chars().find(|c| WIRE_DELIMITERS.contains(c))
}
