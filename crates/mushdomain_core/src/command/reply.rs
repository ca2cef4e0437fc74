//! Handler results and the delimited wire layout of composite replies.
//!
//! Delimiters are part of the host contract: `|` between records, `~`
//! between fields, `*` between list items, `^` between sections and `>`
//! between a section label, its content and its record count.
//!
//! Values are joined without escaping. The stores refuse to persist text
//! containing any of [`crate::model::WIRE_DELIMITERS`], so a field can never
//! shift the layout.

use crate::model::boon::{BoonEntry, BoonListing, BoonTransfer};
use crate::model::domain::{DomainBundle, DomainSecurity, FeedingPreference};

pub const RECORD_SEP: &str = "|";
pub const FIELD_SEP: &str = "~";
pub const ITEM_SEP: &str = "*";
pub const SECTION_SEP: &str = "^";
pub const LABEL_SEP: &str = ">";

/// Successful handler output, stringified just before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Number(i64),
    /// `1` or `0`.
    Flag(bool),
}

impl Reply {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Plain `1`, the host's generic success value.
    pub fn ok() -> Self {
        Self::Flag(true)
    }

    pub fn to_wire_text(&self) -> String {
        match self {
            Self::Text(value) => value.clone(),
            Self::Number(value) => value.to_string(),
            Self::Flag(value) => flag_text(*value).to_string(),
        }
    }
}

impl From<usize> for Reply {
    fn from(value: usize) -> Self {
        Self::Number(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

/// `name~owner~sphere~members~rooms~details`.
pub fn format_bundle(bundle: &DomainBundle) -> String {
    let details = bundle
        .details
        .iter()
        .map(|detail| format!("{}:{}", detail.key, detail.value))
        .collect::<Vec<_>>()
        .join(ITEM_SEP);
    [
        bundle.domain.name.clone(),
        bundle.domain.owner.clone(),
        bundle.domain.sphere.clone(),
        bundle.members.join(ITEM_SEP),
        bundle.rooms.join(ITEM_SEP),
        details,
    ]
    .join(FIELD_SEP)
}

/// `security~rating`.
pub fn format_security(security: &DomainSecurity) -> String {
    format!("{}{FIELD_SEP}{}", security.security, security.rating)
}

/// `method~pool`, with unset fields left empty.
pub fn format_feeding(preference: Option<&FeedingPreference>) -> String {
    let (method, pool) = preference.map_or(("", ""), |preference| {
        (
            preference.method.as_deref().unwrap_or(""),
            preference.pool.as_deref().unwrap_or(""),
        )
    });
    format!("{method}{FIELD_SEP}{pool}")
}

/// `owed>REC|REC>N^owing>REC|REC>N`.
pub fn format_listing(listing: &BoonListing) -> String {
    [
        format_section("owed", &listing.owed),
        format_section("owing", &listing.owing),
    ]
    .join(SECTION_SEP)
}

/// `from~to~timestamp|...`, oldest first.
pub fn format_history(history: &[BoonTransfer]) -> String {
    history
        .iter()
        .map(|transfer| {
            [
                transfer.from.clone(),
                transfer.to.clone(),
                transfer.timestamp.to_string(),
            ]
            .join(FIELD_SEP)
        })
        .collect::<Vec<_>>()
        .join(RECORD_SEP)
}

/// Shortest decimal form: `5` rather than `5.0`.
pub fn format_magnitude(value: f64) -> String {
    value.to_string()
}

fn format_section(label: &str, entries: &[BoonEntry]) -> String {
    let records = entries
        .iter()
        .map(|entry| {
            [
                entry.id.to_string(),
                entry.counterparty.clone(),
                format_magnitude(entry.magnitude),
                flag_text(entry.acknowledged).to_string(),
                flag_text(entry.validated).to_string(),
                entry.created_at.to_string(),
            ]
            .join(FIELD_SEP)
        })
        .collect::<Vec<_>>()
        .join(RECORD_SEP);
    format!("{label}{LABEL_SEP}{records}{LABEL_SEP}{}", entries.len())
}

fn flag_text(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}
