//! In-memory [`KeyValueStore`], used by tests and by the `memory` backend.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::store::{item_size, KeyQuery, KeyValueStore, StoreQuota};
use crate::types::errors::StoreError;

/// Volatile store; everything is lost when it is dropped.
#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<String, Value>>,
    quota: StoreQuota,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: StoreQuota) -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
            quota,
        }
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, query: KeyQuery) -> Result<Map<String, Value>, StoreError> {
        let items = self.items.read().await;
        let result = match query {
            KeyQuery::All => items.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            KeyQuery::Keys(keys) => keys
                .into_iter()
                .filter_map(|k| items.get(&k).map(|v| (k, v.clone())))
                .collect(),
        };
        Ok(result)
    }

    async fn set(&self, new_items: Map<String, Value>) -> Result<(), StoreError> {
        let mut items = self.items.write().await;

        for (key, value) in &new_items {
            self.quota.check_item(key, item_size(key, value))?;
        }
        let total: usize = items
            .iter()
            .filter(|(k, _)| !new_items.contains_key(*k))
            .chain(new_items.iter())
            .map(|(k, v)| item_size(k, v))
            .sum();
        self.quota.check_total(total)?;

        items.extend(new_items);
        Ok(())
    }

    async fn remove(&self, keys: Vec<String>) -> Result<(), StoreError> {
        let mut items = self.items.write().await;
        for key in keys {
            items.remove(&key);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.items.write().await.clear();
        Ok(())
    }
}
