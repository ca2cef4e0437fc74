//! Host-safe output encoding.
//!
//! # Responsibility
//! - Rewrite every response into the 7-bit charset the game host accepts.
//!
//! # Invariants
//! - Works on Unicode scalar values, never on UTF-16 code units.
//! - ASCII passes through byte-for-byte.

pub mod response;

pub use response::{decode, encode, encode_fragments, EncodedFragments};
