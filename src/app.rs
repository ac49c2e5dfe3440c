//! App core for tabsig.
//!
//! Owns the store, both repositories and every service instance, so that the
//! repository lock and the title-correction state are explicit per-process
//! values instead of globals.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::info;

use crate::config::{CoreConfig, StoreBackend};
use crate::database::memory_store::MemoryStore;
use crate::database::sqlite_store::SqliteStore;
use crate::database::store::{KeyValueStore, StorageAdapter};
use crate::managers::settings_repository::SettingsRepository;
use crate::managers::tab_repository::TabRepository;
use crate::services::garbage_collector::GarbageCollector;
use crate::services::lifecycle::LifecycleHandler;
use crate::services::schema_migration::SchemaMigrationManager;
use crate::services::title_correction::{TabHost, TitleCorrectionCoordinator};
use crate::types::errors::StoreError;
use crate::types::tab::TabId;

pub struct App {
    pub storage: StorageAdapter,
    pub tabs: Arc<TabRepository>,
    pub settings: SettingsRepository,
    pub title_correction: Arc<TitleCorrectionCoordinator>,
    pub lifecycle: LifecycleHandler,
    pub garbage_collector: Arc<GarbageCollector>,
    /// Page titles saved before a custom title replaced them. Never persisted.
    title_stash: Mutex<HashMap<TabId, String>>,
}

impl App {
    /// Wires every component on top of `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, host: Arc<dyn TabHost>, config: &CoreConfig) -> Self {
        let storage = StorageAdapter::new(store);
        let tabs = Arc::new(TabRepository::new(storage.clone()));
        let settings = SettingsRepository::new(storage.clone());
        let title_correction = Arc::new(TitleCorrectionCoordinator::new(
            Arc::clone(&tabs),
            host,
            config.title_correction.to_config(),
        ));
        let lifecycle = LifecycleHandler::new(
            Arc::clone(&tabs),
            Arc::clone(&title_correction),
            SchemaMigrationManager::new(),
        );
        let garbage_collector = Arc::new(GarbageCollector::new(
            Arc::clone(&tabs),
            config.gc.retention(),
            config.gc.interval(),
        ));

        Self {
            storage,
            tabs,
            settings,
            title_correction,
            lifecycle,
            garbage_collector,
            title_stash: Mutex::new(HashMap::new()),
        }
    }

    /// Opens the backend named in `config`.
    pub fn from_config(config: &CoreConfig, host: Arc<dyn TabHost>) -> Result<Self, StoreError> {
        let quota = config.store.quota();
        let store: Arc<dyn KeyValueStore> = match config.store.backend {
            StoreBackend::Memory => Arc::new(MemoryStore::with_quota(quota)),
            StoreBackend::Sqlite => {
                let path = config.store.database_path();
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StoreError::Unavailable(format!("Failed to create {}: {}", parent.display(), e))
                    })?;
                }
                info!(path = %path.display(), "Opening signature store");
                Arc::new(SqliteStore::open(&path, quota)?)
            }
        };
        Ok(Self::new(store, host, config))
    }

    /// In-memory store with default settings and no quota.
    pub fn in_memory(host: Arc<dyn TabHost>) -> Self {
        Self::new(Arc::new(MemoryStore::new()), host, &CoreConfig::default())
    }

    pub fn stash_original_title(&self, tab_id: TabId, title: &str) {
        self.stash().insert(tab_id, title.to_string());
    }

    /// Removes and returns the stashed title.
    pub fn unstash_original_title(&self, tab_id: TabId) -> Option<String> {
        self.stash().remove(&tab_id)
    }

    /// Spawns the garbage collector and the title-correction cleanup.
    pub fn start_background_tasks(&self) -> Vec<JoinHandle<()>> {
        vec![
            Arc::clone(&self.garbage_collector).start(),
            Arc::clone(&self.title_correction).start_cleanup(),
        ]
    }

    fn stash(&self) -> std::sync::MutexGuard<'_, HashMap<TabId, String>> {
        self.title_stash
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
