//! Core configuration.
//!
//! Loaded from a JSON file; every field has a default, so a missing file or a
//! partial one is fine. Only a file that exists and does not parse is an error.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::database::store::StoreQuota;
use crate::platform;
use crate::services::title_correction::TitleCorrectionConfig;
use crate::types::errors::ConfigError;

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "TABSIG_CONFIG";
/// Overrides the directory of the SQLite store.
pub const DATA_DIR_ENV: &str = "TABSIG_DATA_DIR";

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DATABASE_FILE_NAME: &str = "signatures.db";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub gc: GcSettings,
    pub title_correction: TitleCorrectionSettings,
    pub store: StoreSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcSettings {
    pub retention_secs: u64,
    pub interval_secs: u64,
}

impl Default for GcSettings {
    fn default() -> Self {
        Self {
            retention_secs: 13 * 60 * 60,
            interval_secs: 60,
        }
    }
}

impl GcSettings {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// Sweep interval. Zero is bumped to one second since a zero-period timer panics.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleCorrectionSettings {
    pub threshold_ms: u64,
    pub max_retries: u32,
    pub delay_ms: u64,
    pub stale_entry_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for TitleCorrectionSettings {
    fn default() -> Self {
        Self {
            threshold_ms: 1000,
            max_retries: 4,
            delay_ms: 100,
            stale_entry_secs: 300,
            cleanup_interval_secs: 60,
        }
    }
}

impl TitleCorrectionSettings {
    pub fn to_config(&self) -> TitleCorrectionConfig {
        TitleCorrectionConfig {
            threshold: Duration::from_millis(self.threshold_ms),
            max_retries: self.max_retries,
            delay: Duration::from_millis(self.delay_ms),
            stale_after: Duration::from_secs(self.stale_entry_secs),
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// SQLite file. `None` uses [`default_database_path`].
    pub path: Option<PathBuf>,
    pub max_item_bytes: Option<usize>,
    pub max_total_bytes: Option<usize>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: None,
            max_item_bytes: Some(StoreQuota::SYNC_ITEM_BYTES),
            max_total_bytes: Some(StoreQuota::SYNC_TOTAL_BYTES),
        }
    }
}

impl StoreSettings {
    pub fn quota(&self) -> StoreQuota {
        StoreQuota {
            max_item_bytes: self.max_item_bytes,
            max_total_bytes: self.max_total_bytes,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_database_path)
    }
}

impl CoreConfig {
    /// Reads `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Loads from [`resolve_config_path`].
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(&resolve_config_path())
    }
}

/// `$TABSIG_CONFIG`, else `config.json` in the platform config dir.
pub fn resolve_config_path() -> PathBuf {
    match std::env::var(CONFIG_ENV) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => platform::get_config_dir().join(CONFIG_FILE_NAME),
    }
}

/// `signatures.db` in `$TABSIG_DATA_DIR`, else in the platform data dir.
pub fn default_database_path() -> PathBuf {
    match std::env::var(DATA_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir).join(DATABASE_FILE_NAME),
        _ => platform::get_data_dir().join(DATABASE_FILE_NAME),
    }
}
