//! SQLite-backed [`KeyValueStore`].
//!
//! Values are kept as JSON text in the `kv_store` table. Multi-key writes and
//! removals run in a single transaction so a failed quota check leaves the
//! table untouched.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use serde_json::{Map, Value};
use tracing::warn;

use super::connection::Database;
use super::store::{item_size, KeyQuery, KeyValueStore, StoreQuota};
use crate::types::errors::StoreError;

/// Persistent store on a local SQLite file.
pub struct SqliteStore {
    db: Mutex<Database>,
    quota: StoreQuota,
}

impl SqliteStore {
    /// Opens (or creates) the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P, quota: StoreQuota) -> Result<Self, StoreError> {
        let db = Database::open(path)?;
        Ok(Self::from_database(db, quota))
    }

    pub fn open_in_memory(quota: StoreQuota) -> Result<Self, StoreError> {
        let db = Database::open_in_memory()?;
        Ok(Self::from_database(db, quota))
    }

    pub fn from_database(db: Database, quota: StoreQuota) -> Self {
        Self {
            db: Mutex::new(db),
            quota,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>, StoreError> {
        self.db
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("database lock poisoned: {}", e)))
    }
}

fn decode(key: &str, raw: &str) -> Option<Value> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key = %key, error = %e, "Skipping undecodable stored value");
            None
        }
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, query: KeyQuery) -> Result<Map<String, Value>, StoreError> {
        let db = self.lock()?;
        let conn = db.connection();
        let mut result = Map::new();

        match query {
            KeyQuery::All => {
                let mut stmt = conn.prepare("SELECT key, value FROM kv_store ORDER BY key")?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?;
                for row in rows {
                    let (key, raw) = row?;
                    if let Some(value) = decode(&key, &raw) {
                        result.insert(key, value);
                    }
                }
            }
            KeyQuery::Keys(keys) => {
                let mut stmt = conn.prepare("SELECT value FROM kv_store WHERE key = ?1")?;
                for key in keys {
                    let raw: Option<String> = stmt
                        .query_row(params![key], |row| row.get(0))
                        .optional()?;
                    if let Some(value) = raw.and_then(|raw| decode(&key, &raw)) {
                        result.insert(key, value);
                    }
                }
            }
        }

        Ok(result)
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), StoreError> {
        let mut db = self.lock()?;
        let tx = db.batch()?;

        for (key, value) in &items {
            let size = item_size(key, value);
            self.quota.check_item(key, size)?;
            tx.execute(
                "INSERT INTO kv_store (key, value, size) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, size = excluded.size",
                params![key, value.to_string(), size as i64],
            )?;
        }

        // Dropping the transaction without commit rolls the batch back.
        self.quota.check_total(Database::stored_bytes(&tx)?)?;

        tx.commit()?;
        Ok(())
    }

    async fn remove(&self, keys: Vec<String>) -> Result<(), StoreError> {
        let mut db = self.lock()?;
        let tx = db.batch()?;
        for key in &keys {
            tx.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let db = self.lock()?;
        db.connection().execute("DELETE FROM kv_store", [])?;
        Ok(())
    }
}
