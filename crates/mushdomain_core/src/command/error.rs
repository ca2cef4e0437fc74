//! Command-level errors and their mapping onto in-band responses.
//!
//! # Invariants
//! - Every error belongs to exactly one [`ErrorClass`].
//! - Internal failures never leak their details into the response; the
//!   details go to the log.

use crate::db::DbError;
use crate::repo::boon_repo::BoonError;
use crate::repo::domain_repo::DomainError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CommandResult<T> = Result<T, CommandError>;

/// Response for failures whose details stay in the log.
pub const INTERNAL_ERROR_RESPONSE: &str = "#-3 INTERNAL ERROR";

/// The three ways a command can fail, as seen by the game host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Name, room or key collision, or a value the store refuses to hold;
    /// reported as `#-1 <message>`.
    Constraint,
    /// Not a member, not the holder, already settled; `#-2 <message>`.
    Precondition,
    /// Store unavailable or malformed input; `#-3 INTERNAL ERROR`.
    Internal,
}

/// Errors raised by command handlers.
#[derive(Debug)]
pub enum CommandError {
    MissingParameter(&'static str),
    InvalidParameter { name: &'static str, value: String },
    Domain(DomainError),
    Boon(BoonError),
    Db(DbError),
}

impl CommandError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingParameter(_) | Self::InvalidParameter { .. } | Self::Db(_) => {
                ErrorClass::Internal
            }
            Self::Domain(err) => match err {
                DomainError::NameCollision { .. }
                | DomainError::RoomCollision { .. }
                | DomainError::MembershipFailure { .. }
                | DomainError::InvalidDetailKey(_)
                | DomainError::InvalidDetailValue { .. }
                | DomainError::ReservedCharacter { .. } => ErrorClass::Constraint,
                DomainError::NotFound { .. } | DomainError::NotMember { .. } => {
                    ErrorClass::Precondition
                }
                DomainError::InvalidDetailPairs(_) | DomainError::Db(_) => ErrorClass::Internal,
            },
            Self::Boon(err) => match err {
                BoonError::ReservedCharacter { .. } => ErrorClass::Constraint,
                BoonError::NotFound(_) | BoonError::NotHolder { .. } | BoonError::Conflict(_) => {
                    ErrorClass::Precondition
                }
                BoonError::InvalidMagnitude(_) | BoonError::InvalidData(_) | BoonError::Db(_) => {
                    ErrorClass::Internal
                }
            },
        }
    }

    /// Stable metadata-only code for log lines.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "missing_parameter",
            Self::InvalidParameter { .. } => "invalid_parameter",
            Self::Db(_) => "db_error",
            Self::Domain(err) => match err {
                DomainError::NameCollision { .. } => "name_collision",
                DomainError::RoomCollision { .. } => "room_collision",
                DomainError::MembershipFailure { .. } => "membership_failure",
                DomainError::NotFound { .. } => "domain_not_found",
                DomainError::NotMember { .. } => "not_member",
                DomainError::InvalidDetailKey(_) => "invalid_detail_key",
                DomainError::InvalidDetailValue { .. } => "invalid_detail_value",
                DomainError::InvalidDetailPairs(_) => "invalid_detail_pairs",
                DomainError::ReservedCharacter { .. } => "reserved_character",
                DomainError::Db(_) => "db_error",
            },
            Self::Boon(err) => match err {
                BoonError::NotFound(_) => "boon_not_found",
                BoonError::NotHolder { .. } => "not_holder",
                BoonError::Conflict(_) => "boon_conflict",
                BoonError::InvalidMagnitude(_) => "invalid_magnitude",
                BoonError::ReservedCharacter { .. } => "reserved_character",
                BoonError::InvalidData(_) => "invalid_boon_data",
                BoonError::Db(_) => "db_error",
            },
        }
    }

    /// In-band response text for this failure, before encoding.
    pub fn response_text(&self) -> String {
        match self.class() {
            ErrorClass::Constraint => format!("#-1 {self}"),
            ErrorClass::Precondition => format!("#-2 {self}"),
            ErrorClass::Internal => INTERNAL_ERROR_RESPONSE.to_string(),
        }
    }
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingParameter(name) => write!(f, "missing parameter `{name}`"),
            Self::InvalidParameter { name, value } => {
                write!(f, "invalid value `{value}` for parameter `{name}`")
            }
            Self::Domain(err) => write!(f, "{err}"),
            Self::Boon(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CommandError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Domain(err) => Some(err),
            Self::Boon(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::MissingParameter(_) | Self::InvalidParameter { .. } => None,
        }
    }
}

impl From<DomainError> for CommandError {
    fn from(value: DomainError) -> Self {
        Self::Domain(value)
    }
}

impl From<BoonError> for CommandError {
    fn from(value: BoonError) -> Self {
        Self::Boon(value)
    }
}

impl From<DbError> for CommandError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for CommandError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
