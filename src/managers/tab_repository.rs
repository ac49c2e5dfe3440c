//! Signature repository.
//!
//! Owns the mapping from tab id to [`TabRecord`] inside the key-value store and
//! implements the heuristic that re-associates a stored signature with a new
//! tab id when the browser hands out a different one (reopen, restore, discard).
//!
//! The browser delivers tab events from independent sources, so every
//! read-modify-write sequence triggered by a host callback must run through
//! [`TabRepository::run_exclusive`]. None of the operations below take the
//! lock themselves, and none of them re-enter it.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::database::store::{parse_tab_key, StorageAdapter};
use crate::types::errors::RepositoryError;
use crate::types::tab::{TabId, TabRecord};

/// Async repository of tab records.
pub struct TabRepository {
    storage: StorageAdapter,
    exclusive: Mutex<()>,
}

impl TabRepository {
    pub fn new(storage: StorageAdapter) -> Self {
        Self {
            storage,
            exclusive: Mutex::new(()),
        }
    }

    /// The adapter this repository writes through.
    pub fn storage(&self) -> &StorageAdapter {
        &self.storage
    }

    /// Runs `f` while holding the repository-wide lock.
    ///
    /// Waiters are served in FIFO order. `f` must not call `run_exclusive`
    /// again or it will wait on itself forever.
    pub async fn run_exclusive<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.exclusive.lock().await;
        f().await
    }

    pub async fn get_by_id(&self, id: TabId) -> Result<Option<TabRecord>, RepositoryError> {
        debug!(tab_id = id, "get_by_id");
        match self.storage.get_one(id).await? {
            Some(value) => decode_record(id, value).map(Some),
            None => Ok(None),
        }
    }

    /// Every stored tab record, in ascending id order. Settings and other
    /// non-tab keys are skipped, as are values that no longer decode.
    pub async fn get_all(&self) -> Result<Vec<TabRecord>, RepositoryError> {
        let items = self.storage.get_all().await?;
        let mut records: Vec<TabRecord> = items
            .into_iter()
            .filter_map(|(key, value)| {
                let id = parse_tab_key(&key)?;
                match decode_record(id, value) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Skipping malformed tab record");
                        None
                    }
                }
            })
            .collect();
        records.sort_by_key(|r| r.id);
        debug!(count = records.len(), "get_all");
        Ok(records)
    }

    /// Upserts `record` by id.
    ///
    /// Closed state is owned by the repository: an existing record keeps its
    /// stored `is_closed`/`closed_at`, and a new record is saved open.
    pub async fn save(&self, record: &TabRecord) -> Result<(), RepositoryError> {
        debug!(tab_id = record.id, url = %record.url, "save");
        let existing = self.get_by_id(record.id).await?;

        let mut to_store = record.clone();
        match existing {
            Some(existing) => {
                to_store.is_closed = existing.is_closed;
                to_store.closed_at = existing.closed_at;
            }
            None => to_store.reopen(),
        }

        self.write(&to_store).await
    }

    pub async fn delete(&self, id: TabId) -> Result<(), RepositoryError> {
        debug!(tab_id = id, "delete");
        self.storage.remove_one(id).await?;
        Ok(())
    }

    pub async fn delete_many(&self, ids: &[TabId]) -> Result<(), RepositoryError> {
        debug!(ids = ?ids, "delete_many");
        self.storage.remove(ids.iter().copied()).await?;
        Ok(())
    }

    /// Batched upsert. Writes the records as given, closed state included.
    pub async fn update_many(&self, records: &[TabRecord]) -> Result<(), RepositoryError> {
        debug!(count = records.len(), "update_many");
        let mut updates = Map::new();
        for record in records {
            updates.insert(record.id.to_string(), encode_record(record)?);
        }
        self.storage.set(updates).await?;
        Ok(())
    }

    /// Finds the stored record that most plausibly belongs to the tab
    /// observed as `(id, url, index)`.
    ///
    /// 1. A record stored under `id` always wins.
    /// 2. Otherwise only closed records with the same url are candidates.
    /// 3. A single candidate is returned as is.
    /// 4. Among several, the first one at the same `index` wins.
    /// 5. Failing that, the most recently closed one.
    pub async fn find_matching_tab(
        &self,
        id: TabId,
        url: &str,
        index: u32,
    ) -> Result<Option<TabRecord>, RepositoryError> {
        debug!(tab_id = id, url = %url, index, "find_matching_tab");
        let records = self.get_all().await?;
        Ok(select_match(records, id, url, index))
    }

    pub async fn find_by_url_and_closed(
        &self,
        url: &str,
        is_closed: bool,
    ) -> Result<Vec<TabRecord>, RepositoryError> {
        let records = self.get_all().await?;
        Ok(records
            .into_iter()
            .filter(|r| r.url == url && r.is_closed == is_closed)
            .collect())
    }

    /// Finds the pre-discard record of a tab that was just unloaded.
    ///
    /// A discard keeps the tab open at the same url and position, so at most
    /// one open record may match. More than one means the table is corrupt.
    pub async fn find_old_record_of_freshly_discarded_tab(
        &self,
        url: &str,
        index: u32,
    ) -> Result<Option<TabRecord>, RepositoryError> {
        debug!(url = %url, index, "find_old_record_of_freshly_discarded_tab");
        let mut candidates: Vec<TabRecord> = self
            .get_all()
            .await?
            .into_iter()
            .filter(|r| !r.is_closed && r.url == url && r.index == index)
            .collect();

        match candidates.len() {
            0 => Ok(None),
            1 => Ok(candidates.pop()),
            n => Err(RepositoryError::InvariantViolation(format!(
                "{} open records match freshly discarded tab at {} (index {}): {:?}",
                n,
                url,
                index,
                candidates.iter().map(|r| r.id).collect::<Vec<_>>()
            ))),
        }
    }

    /// Matches the observed tab against the store and re-keys the match to `id`.
    ///
    /// The record is written under `id` before the old key is removed, so a
    /// failed write never loses it. Closed state is cleared only when the tab
    /// is actively being opened.
    pub async fn load_tab_and_update_id(
        &self,
        id: TabId,
        url: &str,
        index: u32,
        is_being_opened: bool,
    ) -> Result<Option<TabRecord>, RepositoryError> {
        let Some(mut matched) = self.find_matching_tab(id, url, index).await? else {
            debug!(tab_id = id, "No matching record");
            return Ok(None);
        };

        debug!(tab_id = id, matched_id = matched.id, "Matched stored record");
        let old_id = std::mem::replace(&mut matched.id, id);
        if is_being_opened {
            matched.reopen();
        }
        self.write(&matched).await?;
        if old_id != id {
            self.delete(old_id).await?;
        }
        Ok(Some(matched))
    }

    /// Moves the pre-discard record of a just-discarded tab under its new id.
    /// Closed state is left as it was.
    pub async fn reattach_discarded_tab(
        &self,
        new_id: TabId,
        url: &str,
        index: u32,
    ) -> Result<Option<TabRecord>, RepositoryError> {
        let Some(mut record) = self
            .find_old_record_of_freshly_discarded_tab(url, index)
            .await?
        else {
            return Ok(None);
        };

        if record.id != new_id {
            debug!(old_id = record.id, new_id, "Re-keying discarded tab");
            let old_id = std::mem::replace(&mut record.id, new_id);
            self.write(&record).await?;
            self.delete(old_id).await?;
        }
        Ok(Some(record))
    }

    /// Marks the record stored under `id` as closed at `at`.
    pub async fn mark_tab_closed(
        &self,
        id: TabId,
        at: DateTime<Utc>,
    ) -> Result<Option<TabRecord>, RepositoryError> {
        let Some(mut record) = self.get_by_id(id).await? else {
            return Ok(None);
        };
        record.mark_closed(at);
        self.write(&record).await?;
        Ok(Some(record))
    }

    /// Marks every open record closed at `at`. Returns how many changed.
    ///
    /// Tab ids do not survive a browser restart, so after one every stored
    /// record is only reachable through matching.
    pub async fn mark_all_open_as_closed(&self, at: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut changed: Vec<TabRecord> = self
            .get_all()
            .await?
            .into_iter()
            .filter(|r| !r.is_closed)
            .collect();
        for record in &mut changed {
            record.mark_closed(at);
        }
        self.update_many(&changed).await?;
        Ok(changed.len())
    }

    /// Records a new window position for `id`.
    pub async fn update_index(
        &self,
        id: TabId,
        index: u32,
    ) -> Result<Option<TabRecord>, RepositoryError> {
        let Some(mut record) = self.get_by_id(id).await? else {
            return Ok(None);
        };
        if record.index != index {
            record.index = index;
            self.write(&record).await?;
        }
        Ok(Some(record))
    }

    async fn write(&self, record: &TabRecord) -> Result<(), RepositoryError> {
        let value = encode_record(record)?;
        self.storage.set_one(record.id, value).await?;
        Ok(())
    }
}

/// Pure part of [`TabRepository::find_matching_tab`].
pub fn select_match(records: Vec<TabRecord>, id: TabId, url: &str, index: u32) -> Option<TabRecord> {
    let mut candidates = Vec::new();
    for record in records {
        if record.id == id {
            return Some(record);
        }
        if record.is_closed && record.url == url {
            candidates.push(record);
        }
    }

    if candidates.len() <= 1 {
        return candidates.pop();
    }

    candidates.sort_by_key(|r| r.id);
    if let Some(pos) = candidates.iter().position(|r| r.index == index) {
        return Some(candidates.swap_remove(pos));
    }

    // Missing timestamps rank oldest. Ties keep the lowest id.
    candidates
        .into_iter()
        .rev()
        .max_by_key(|r| r.closed_at)
}

fn encode_record(record: &TabRecord) -> Result<Value, RepositoryError> {
    serde_json::to_value(record).map_err(|e| RepositoryError::Serialization {
        id: record.id,
        message: e.to_string(),
    })
}

fn decode_record(id: TabId, value: Value) -> Result<TabRecord, RepositoryError> {
    serde_json::from_value(value).map_err(|e| RepositoryError::Serialization {
        id,
        message: e.to_string(),
    })
}
