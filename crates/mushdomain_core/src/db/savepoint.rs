//! Named SAVEPOINT guard for atomic multi-step mutations.
//!
//! # Invariants
//! - A guard that is dropped without `release()` rolls back every write made
//!   since it was opened, on every exit path including `?` and panics.
//! - Savepoints nest, so a guarded store call stays atomic inside the
//!   router's outer transaction and on a bare autocommit connection alike.

use super::DbResult;
use log::warn;
use rusqlite::Connection;

/// Scoped savepoint over a borrowed connection.
pub struct ScopedSavepoint<'conn> {
    conn: &'conn Connection,
    name: &'static str,
    finished: bool,
}

impl<'conn> ScopedSavepoint<'conn> {
    /// Opens `SAVEPOINT <name>` on `conn`.
    ///
    /// `name` must be a plain SQL identifier; callers pass string literals.
    pub fn open(conn: &'conn Connection, name: &'static str) -> DbResult<Self> {
        conn.execute_batch(&format!("SAVEPOINT {name};"))?;
        Ok(Self {
            conn,
            name,
            finished: false,
        })
    }

    /// Connection the savepoint was opened on.
    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }

    /// Keeps all writes made under this savepoint.
    pub fn release(mut self) -> DbResult<()> {
        self.finished = true;
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {};", self.name))?;
        Ok(())
    }

    /// Discards all writes made under this savepoint.
    pub fn rollback(mut self) -> DbResult<()> {
        self.finished = true;
        self.rollback_inner()
    }

    fn rollback_inner(&self) -> DbResult<()> {
        self.conn.execute_batch(&format!(
            "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name};",
            name = self.name
        ))?;
        Ok(())
    }
}

impl Drop for ScopedSavepoint<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.rollback_inner() {
            warn!(
                "event=savepoint_rollback module=db status=error savepoint={} error={}",
                self.name, err
            );
        }
    }
}
