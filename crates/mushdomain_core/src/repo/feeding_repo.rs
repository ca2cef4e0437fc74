//! Feeding preference store: one row per player, two independent fields.

use crate::db::DbError;
use crate::model::domain::FeedingPreference;
use rusqlite::{params, Connection, OptionalExtension};

pub type FeedingResult<T> = Result<T, DbError>;

/// Feeding preference operations.
pub trait FeedingStore {
    fn set_feeding_method(&self, player: &str, method: &str) -> FeedingResult<()>;
    fn set_feeding_pool(&self, player: &str, pool: &str) -> FeedingResult<()>;
    fn get_feeding(&self, player: &str) -> FeedingResult<Option<FeedingPreference>>;
}

/// SQLite-backed feeding preference store.
pub struct SqliteFeedingStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFeedingStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl FeedingStore for SqliteFeedingStore<'_> {
    fn set_feeding_method(&self, player: &str, method: &str) -> FeedingResult<()> {
        self.conn.execute(
            "INSERT INTO feeding (player, method) VALUES (?1, ?2)
             ON CONFLICT(player) DO UPDATE SET method = excluded.method;",
            params![player, method],
        )?;
        Ok(())
    }

    fn set_feeding_pool(&self, player: &str, pool: &str) -> FeedingResult<()> {
        self.conn.execute(
            "INSERT INTO feeding (player, pool) VALUES (?1, ?2)
             ON CONFLICT(player) DO UPDATE SET pool = excluded.pool;",
            params![player, pool],
        )?;
        Ok(())
    }

    fn get_feeding(&self, player: &str) -> FeedingResult<Option<FeedingPreference>> {
        let preference = self
            .conn
            .query_row(
                "SELECT player, method, pool FROM feeding WHERE player = ?1;",
                [player],
                |row| {
                    Ok(FeedingPreference {
                        player: row.get(0)?,
                        method: row.get(1)?,
                        pool: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(preference)
    }
}
