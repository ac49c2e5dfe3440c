//! SQLite handle behind [`SqliteStore`](super::SqliteStore).
//!
//! Opening a [`Database`] brings the `kv_store` table up to date. Writes go
//! through [`Database::batch`], so a multi-key `set` or `remove` either lands
//! completely or not at all.

use std::path::Path;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use super::migrations;

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens the signature database at `path`, creating the file if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        Self::prepare(Connection::open(path)?)
    }

    /// Volatile database, gone when dropped.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, rusqlite::Error> {
        migrations::run_all(&conn)?;
        Ok(Self { conn })
    }

    /// Read access for queries outside a batch.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Starts a write batch. It rolls back unless committed.
    ///
    /// The write lock is taken up front so the quota check inside the batch
    /// sees the same table it commits against.
    pub fn batch(&mut self) -> Result<Transaction<'_>, rusqlite::Error> {
        self.conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
    }

    /// Table schema version recorded by the last open.
    pub fn schema_version(&self) -> i32 {
        migrations::get_schema_version(&self.conn)
    }

    /// Bytes currently accounted to stored items, as seen by `conn`.
    pub fn stored_bytes(conn: &Connection) -> Result<usize, rusqlite::Error> {
        let total: i64 = conn.query_row("SELECT COALESCE(SUM(size), 0) FROM kv_store", [], |row| {
            row.get(0)
        })?;
        Ok(total.max(0) as usize)
    }
}
