//! Domain (territory) records.
//!
//! # Invariants
//! - `(name, owner)` and `(name, sphere)` are unique among domains.
//! - `(sphere, room)` is unique among room claims.
//! - Detail keys are stored lower-cased.

use serde::{Deserialize, Serialize};

/// Row id of a domain in `domains.idDomains`.
pub type DomainId = i64;

/// Detail key read by the room security lookup.
pub const SECURITY_DETAIL_KEY: &str = "security";
/// Detail key read by the room security lookup.
pub const RATING_DETAIL_KEY: &str = "rating";

/// A named territory claimed by one player within one sphere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: DomainId,
    pub name: String,
    pub sphere: String,
    pub owner: String,
}

/// One free-form key/value attribute of a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainDetail {
    pub key: String,
    pub value: String,
}

/// Everything a member may see about a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainBundle {
    pub domain: Domain,
    /// Insertion order.
    pub members: Vec<String>,
    /// Insertion order.
    pub rooms: Vec<String>,
    /// Ordered by key.
    pub details: Vec<DomainDetail>,
}

/// Security values for the domain owning one room.
///
/// Unset keys (and unclaimed rooms) read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSecurity {
    pub security: i64,
    pub rating: i64,
}

/// Per-player feeding preferences; each field is set independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedingPreference {
    pub player: String,
    pub method: Option<String>,
    pub pool: Option<String>,
}

/// Lower-cases and trims a detail key before it reaches storage.
pub fn normalize_detail_key(key: &str) -> String {
    key.trim().to_lowercase()
}
