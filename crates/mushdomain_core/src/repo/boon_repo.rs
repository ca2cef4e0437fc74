//! Boon ledger: favors owed between actors and their holder transfers.
//!
//! # Responsibility
//! - Own every read and write against `boons` and `boon_transactions`.
//! - Keep the holder change and its audit row in one atomic step.
//!
//! # Invariants
//! - `acknowledged` and `validated` are only ever set, never cleared.
//! - Rejection deletes a boon only while neither flag is set.
//! - Every successful holder change appends exactly one audit row, stamped no
//!   earlier than the previous transfer of the same boon.
//! - Listings are ordered `date ASC, idBoons ASC`.

use crate::db::{DbError, ScopedSavepoint};
use crate::model::boon::{Boon, BoonEntry, BoonId, BoonListing, BoonTransfer, NewBoon};
use crate::model::find_wire_delimiter;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Current time as Unix epoch milliseconds, evaluated by SQLite.
const NOW_MS_SQL: &str = "CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)";

const BOON_SELECT_SQL: &str = "SELECT
    idBoons,
    magnitude,
    bitFrom,
    bitTo,
    bitHolder,
    acknowledged,
    validated,
    date,
    private
FROM boons";

pub type BoonResult<T> = Result<T, BoonError>;

/// Errors from boon ledger operations.
#[derive(Debug)]
pub enum BoonError {
    /// No boon with this id (or not granted by the given actor).
    NotFound(BoonId),
    /// The caller named a holder that does not currently hold the boon.
    NotHolder { boon_id: BoonId, claimed: String },
    /// The boon is already validated or acknowledged.
    Conflict(BoonId),
    /// Magnitude is NaN or infinite.
    InvalidMagnitude(f64),
    /// Actor id contains a character that structures composite replies.
    ReservedCharacter { field: &'static str, value: String },
    /// Persisted data cannot be converted to the read model.
    InvalidData(String),
    Db(DbError),
}

impl Display for BoonError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "boon not found: {id}"),
            Self::NotHolder { boon_id, claimed } => {
                write!(f, "{claimed} does not hold boon {boon_id}")
            }
            Self::Conflict(id) => {
                write!(f, "boon {id} is already validated or acknowledged")
            }
            Self::InvalidMagnitude(value) => write!(f, "invalid boon magnitude: {value}"),
            Self::ReservedCharacter { field, .. } => {
                write!(f, "{field} contains a reserved delimiter character")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted boon data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BoonError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for BoonError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for BoonError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Boon ledger operations.
pub trait BoonLedger {
    /// Records a new boon held by its recipient.
    fn add_boon(&self, boon: &NewBoon) -> BoonResult<BoonId>;
    /// Loads one boon by id.
    fn get_boon(&self, id: BoonId) -> BoonResult<Option<Boon>>;
    /// Sets `validated` when `from` granted the boon; `false` when nothing
    /// matched.
    fn validate_boon(&self, id: BoonId, from: &str) -> BoonResult<bool>;
    /// Deletes an unvalidated, unacknowledged boon granted by `from`.
    fn reject_boon(&self, id: BoonId, from: &str) -> BoonResult<()>;
    /// Sets `acknowledged`; `false` when the id does not exist.
    ///
    /// No check is made that the caller is a party to the boon.
    fn acknowledge_boon(&self, id: BoonId) -> BoonResult<bool>;
    /// Moves the boon from its current holder to `to_holder`.
    fn transfer_boon(
        &self,
        id: BoonId,
        from_holder: &str,
        to_holder: &str,
    ) -> BoonResult<BoonTransfer>;
    /// Boons the actor holds and boons the actor granted.
    fn show_boons(&self, actor: &str) -> BoonResult<BoonListing>;
    /// Every holder change of one boon, oldest first.
    fn boon_transfer_history(&self, id: BoonId) -> BoonResult<Vec<BoonTransfer>>;
}

/// SQLite-backed boon ledger.
pub struct SqliteBoonLedger<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBoonLedger<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn list_entries(
        &self,
        actor_column: &str,
        counterparty_column: &str,
        actor: &str,
    ) -> BoonResult<Vec<BoonEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT idBoons, {counterparty_column} AS counterparty, magnitude, acknowledged, validated, date
             FROM boons
             WHERE {actor_column} = ?1
             ORDER BY date ASC, idBoons ASC;"
        ))?;
        let mut rows = stmt.query([actor])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(BoonEntry {
                id: row.get("idBoons")?,
                counterparty: row.get("counterparty")?,
                magnitude: row.get("magnitude")?,
                acknowledged: parse_flag(row, "acknowledged")?,
                validated: parse_flag(row, "validated")?,
                created_at: row.get("date")?,
            });
        }
        Ok(entries)
    }
}

impl BoonLedger for SqliteBoonLedger<'_> {
    fn add_boon(&self, boon: &NewBoon) -> BoonResult<BoonId> {
        if !boon.magnitude.is_finite() {
            return Err(BoonError::InvalidMagnitude(boon.magnitude));
        }
        ensure_wire_safe("from", &boon.from)?;
        ensure_wire_safe("to", &boon.to)?;

        self.conn.execute(
            &format!(
                "INSERT INTO boons (
                    magnitude,
                    bitFrom,
                    bitTo,
                    bitHolder,
                    acknowledged,
                    validated,
                    date,
                    private
                ) VALUES (?1, ?2, ?3, ?3, ?4, ?5, COALESCE(?6, {NOW_MS_SQL}), ?7);"
            ),
            params![
                boon.magnitude,
                boon.from.as_str(),
                boon.to.as_str(),
                bool_to_int(boon.acknowledged),
                bool_to_int(boon.validated),
                boon.created_at,
                bool_to_int(boon.private),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_boon(&self, id: BoonId) -> BoonResult<Option<Boon>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BOON_SELECT_SQL} WHERE idBoons = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_boon_row(row)?));
        }
        Ok(None)
    }

    fn validate_boon(&self, id: BoonId, from: &str) -> BoonResult<bool> {
        let changed = self.conn.execute(
            "UPDATE boons SET validated = 1 WHERE idBoons = ?1 AND bitFrom = ?2;",
            params![id, from],
        )?;
        Ok(changed > 0)
    }

    fn reject_boon(&self, id: BoonId, from: &str) -> BoonResult<()> {
        let state = self
            .conn
            .query_row(
                "SELECT validated, acknowledged FROM boons WHERE idBoons = ?1 AND bitFrom = ?2;",
                params![id, from],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        let Some((validated, acknowledged)) = state else {
            return Err(BoonError::NotFound(id));
        };
        if validated != 0 || acknowledged != 0 {
            return Err(BoonError::Conflict(id));
        }

        let removed = self.conn.execute(
            "DELETE FROM boons
             WHERE idBoons = ?1
               AND bitFrom = ?2
               AND validated = 0
               AND acknowledged = 0;",
            params![id, from],
        )?;
        if removed == 0 {
            return Err(BoonError::Conflict(id));
        }
        Ok(())
    }

    fn acknowledge_boon(&self, id: BoonId) -> BoonResult<bool> {
        let changed = self.conn.execute(
            "UPDATE boons SET acknowledged = 1 WHERE idBoons = ?1;",
            [id],
        )?;
        Ok(changed > 0)
    }

    fn transfer_boon(
        &self,
        id: BoonId,
        from_holder: &str,
        to_holder: &str,
    ) -> BoonResult<BoonTransfer> {
        ensure_wire_safe("holder", to_holder)?;
        let savepoint = ScopedSavepoint::open(self.conn, "transfer_boon")?;
        let conn = savepoint.conn();

        let holder: Option<String> = conn
            .query_row(
                "SELECT bitHolder FROM boons WHERE idBoons = ?1;",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(holder) = holder else {
            return Err(BoonError::NotFound(id));
        };
        if holder != from_holder {
            return Err(BoonError::NotHolder {
                boon_id: id,
                claimed: from_holder.to_string(),
            });
        }

        let timestamp: i64 = conn.query_row(
            &format!(
                "SELECT MAX({NOW_MS_SQL}, COALESCE(
                    (SELECT MAX(txDate) FROM boon_transactions WHERE idBoons = ?1),
                    0
                ));"
            ),
            [id],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO boon_transactions (bitFrom, bitTo, idBoons, txDate)
             VALUES (?1, ?2, ?3, ?4);",
            params![from_holder, to_holder, id, timestamp],
        )?;
        let changed = conn.execute(
            "UPDATE boons SET bitHolder = ?1 WHERE idBoons = ?2 AND bitHolder = ?3;",
            params![to_holder, id, from_holder],
        )?;
        if changed == 0 {
            return Err(BoonError::NotHolder {
                boon_id: id,
                claimed: from_holder.to_string(),
            });
        }

        savepoint.release()?;
        Ok(BoonTransfer {
            boon_id: id,
            from: from_holder.to_string(),
            to: to_holder.to_string(),
            timestamp,
        })
    }

    fn show_boons(&self, actor: &str) -> BoonResult<BoonListing> {
        Ok(BoonListing {
            owed: self.list_entries("bitHolder", "bitFrom", actor)?,
            owing: self.list_entries("bitFrom", "bitHolder", actor)?,
        })
    }

    fn boon_transfer_history(&self, id: BoonId) -> BoonResult<Vec<BoonTransfer>> {
        let mut stmt = self.conn.prepare(
            "SELECT idBoons, bitFrom, bitTo, txDate
             FROM boon_transactions
             WHERE idBoons = ?1
             ORDER BY txDate ASC, rowid ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut history = Vec::new();
        while let Some(row) = rows.next()? {
            history.push(BoonTransfer {
                boon_id: row.get(0)?,
                from: row.get(1)?,
                to: row.get(2)?,
                timestamp: row.get(3)?,
            });
        }
        Ok(history)
    }
}

fn ensure_wire_safe(field: &'static str, value: &str) -> BoonResult<()> {
    match find_wire_delimiter(value) {
        Some(_) => Err(BoonError::ReservedCharacter {
            field,
            value: value.to_string(),
        }),
        None => Ok(()),
    }
}

fn parse_boon_row(row: &Row<'_>) -> BoonResult<Boon> {
    Ok(Boon {
        id: row.get("idBoons")?,
        magnitude: row.get("magnitude")?,
        from: row.get("bitFrom")?,
        to: row.get("bitTo")?,
        holder: row.get("bitHolder")?,
        acknowledged: parse_flag(row, "acknowledged")?,
        validated: parse_flag(row, "validated")?,
        created_at: row.get("date")?,
        private: parse_flag(row, "private")?,
    })
}

fn parse_flag(row: &Row<'_>, column: &str) -> BoonResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(BoonError::InvalidData(format!(
            "invalid flag value `{other}` in boons.{column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
