//! SQLite storage bootstrap, schema migrations and scoped savepoints.
//!
//! # Responsibility
//! - Open and configure the shared `domain.db` store for one invocation.
//! - Apply schema migrations in deterministic order.
//! - Provide the savepoint guard used by multi-step mutations.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - No domain or boon data is read or written before migrations succeed.
//! - Foreign keys are enforced so revoking a domain cascades to its rows.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;
mod savepoint;

pub use open::{open_db, open_db_in_memory};
pub use savepoint::ScopedSavepoint;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// Returns whether SQLite rejected a write because of a constraint.
    ///
    /// Covers UNIQUE/FOREIGN KEY violations and `RAISE(ABORT, ...)` triggers.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Self::Sqlite(err) => is_constraint_violation(err),
            Self::UnsupportedSchemaVersion { .. } => false,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Classifies a raw SQLite error by result code, never by message text.
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    err.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation)
}
