//! Table migrations for the SQLite-backed key-value store.
//!
//! Uses a `schema_version` table to track which migrations have been applied.
//! Each migration runs exactly once and is recorded with a timestamp. This is
//! the physical table layout only; the shape of the JSON values stored in it
//! is versioned separately by `services::schema_migration`.

use rusqlite::Connection;

/// Current table schema version. Bump this when adding a new migration.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Returns the current table schema version (0 if nothing has been applied).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

/// Runs all pending migrations against the provided connection.
///
/// # Errors
/// Returns `rusqlite::Error` if any SQL statement fails.
pub fn run_all(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY,
             applied_at INTEGER NOT NULL,
             description TEXT NOT NULL
         );",
    )?;

    let current = get_schema_version(conn);

    if current < 1 {
        migration_v1(conn)?;
        record_version(conn, 1, "Initial schema: kv_store table")?;
    }

    if current < 2 {
        migration_v2(conn)?;
        record_version(conn, 2, "Track value size per key for quota accounting")?;
    }

    Ok(())
}

fn record_version(conn: &Connection, version: i32, description: &str) -> Result<(), rusqlite::Error> {
    let now = chrono::Utc::now().timestamp();
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
        rusqlite::params![version, now, description],
    )?;
    Ok(())
}

/// V1: key-value table. Values are JSON text.
fn migration_v1(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )
}

/// V2: byte size column so quota checks do not need to re-serialize every value.
fn migration_v2(conn: &Connection) -> Result<(), rusqlite::Error> {
    let has_size: bool = conn
        .prepare("SELECT COUNT(*) FROM pragma_table_info('kv_store') WHERE name = 'size'")?
        .query_row([], |row| row.get::<_, i64>(0))
        .map(|count| count > 0)?;
    if !has_size {
        conn.execute_batch(
            "ALTER TABLE kv_store ADD COLUMN size INTEGER NOT NULL DEFAULT 0;
             UPDATE kv_store SET size = length(CAST(key AS BLOB)) + length(CAST(value AS BLOB));",
        )?;
    }
    Ok(())
}
