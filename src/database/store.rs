//! Key-value store abstraction.
//!
//! The host persistence layer is modelled as an async, string-keyed JSON store
//! ([`KeyValueStore`]). [`StorageAdapter`] sits on top of it and is what the
//! repositories use: it coerces numeric tab ids to string keys and logs every
//! round-trip. There are no retries at this layer; failures propagate.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::types::errors::StoreError;
use crate::types::tab::TabId;

/// Which keys a `get` should return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyQuery {
    /// Every stored pair. Used for full scans.
    All,
    /// Only the listed keys; missing keys are absent from the result.
    Keys(Vec<String>),
}

/// Host-provided, eventually-persisted key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, query: KeyQuery) -> Result<Map<String, Value>, StoreError>;
    async fn set(&self, items: Map<String, Value>) -> Result<(), StoreError>;
    async fn remove(&self, keys: Vec<String>) -> Result<(), StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;
}

/// A store key. Tab ids are stored as their decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the key back into a tab id, if it is one.
    pub fn as_tab_id(&self) -> Option<TabId> {
        parse_tab_key(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<TabId> for StorageKey {
    fn from(id: TabId) -> Self {
        StorageKey(id.to_string())
    }
}

impl From<&str> for StorageKey {
    fn from(key: &str) -> Self {
        StorageKey(key.to_string())
    }
}

impl From<String> for StorageKey {
    fn from(key: String) -> Self {
        StorageKey(key)
    }
}

impl From<&String> for StorageKey {
    fn from(key: &String) -> Self {
        StorageKey(key.clone())
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the tab id encoded in a store key, or `None` for settings and
/// other non-tab keys.
pub fn parse_tab_key(key: &str) -> Option<TabId> {
    key.trim().parse::<TabId>().ok()
}

/// Bytes a pair counts against the quota: key length plus serialized value length.
pub fn item_size(key: &str, value: &Value) -> usize {
    key.len() + value.to_string().len()
}

/// Size limits of the store. `None` disables a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreQuota {
    pub max_item_bytes: Option<usize>,
    pub max_total_bytes: Option<usize>,
}

impl StoreQuota {
    /// Per-item and total limits of browser sync storage.
    pub const SYNC_ITEM_BYTES: usize = 8_192;
    pub const SYNC_TOTAL_BYTES: usize = 102_400;

    pub fn unlimited() -> Self {
        Self {
            max_item_bytes: None,
            max_total_bytes: None,
        }
    }

    pub fn sync_storage() -> Self {
        Self {
            max_item_bytes: Some(Self::SYNC_ITEM_BYTES),
            max_total_bytes: Some(Self::SYNC_TOTAL_BYTES),
        }
    }

    pub fn check_item(&self, key: &str, bytes: usize) -> Result<(), StoreError> {
        match self.max_item_bytes {
            Some(limit) if bytes > limit => Err(StoreError::QuotaExceeded {
                key: key.to_string(),
                bytes,
                limit,
            }),
            _ => Ok(()),
        }
    }

    pub fn check_total(&self, bytes: usize) -> Result<(), StoreError> {
        match self.max_total_bytes {
            Some(limit) if bytes > limit => Err(StoreError::QuotaExceeded {
                key: "*".to_string(),
                bytes,
                limit,
            }),
            _ => Ok(()),
        }
    }
}

impl Default for StoreQuota {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Typed front door to a [`KeyValueStore`].
#[derive(Clone)]
pub struct StorageAdapter {
    store: Arc<dyn KeyValueStore>,
}

impl StorageAdapter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Returns the value stored under `key`, if any.
    pub async fn get_one(&self, key: impl Into<StorageKey>) -> Result<Option<Value>, StoreError> {
        let key = key.into().into_string();
        debug!(key = %key, "storage get");
        let mut items = self.store.get(KeyQuery::Keys(vec![key.clone()])).await?;
        Ok(items.remove(&key))
    }

    /// Returns the stored pairs for the given keys. Missing keys are omitted.
    pub async fn get_many<K, I>(&self, keys: I) -> Result<Map<String, Value>, StoreError>
    where
        K: Into<StorageKey>,
        I: IntoIterator<Item = K>,
    {
        let keys: Vec<String> = keys.into_iter().map(|k| k.into().into_string()).collect();
        if keys.is_empty() {
            return Ok(Map::new());
        }
        debug!(count = keys.len(), "storage get many");
        self.store.get(KeyQuery::Keys(keys)).await
    }

    /// Returns every stored pair.
    pub async fn get_all(&self) -> Result<Map<String, Value>, StoreError> {
        debug!("storage get all");
        self.store.get(KeyQuery::All).await
    }

    pub async fn set(&self, items: Map<String, Value>) -> Result<(), StoreError> {
        if items.is_empty() {
            return Ok(());
        }
        debug!(count = items.len(), "storage set");
        self.store.set(items).await
    }

    pub async fn set_one(&self, key: impl Into<StorageKey>, value: Value) -> Result<(), StoreError> {
        let mut items = Map::new();
        items.insert(key.into().into_string(), value);
        self.set(items).await
    }

    pub async fn remove<K, I>(&self, keys: I) -> Result<(), StoreError>
    where
        K: Into<StorageKey>,
        I: IntoIterator<Item = K>,
    {
        let keys: Vec<String> = keys.into_iter().map(|k| k.into().into_string()).collect();
        if keys.is_empty() {
            return Ok(());
        }
        debug!(keys = ?keys, "storage remove");
        self.store.remove(keys).await
    }

    pub async fn remove_one(&self, key: impl Into<StorageKey>) -> Result<(), StoreError> {
        let key: StorageKey = key.into();
        self.remove([key]).await
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        debug!("storage clear");
        self.store.clear().await
    }
}
