//! Versioned migrations of the persisted store layout.
//!
//! The whole store snapshot is run through every migration newer than the
//! stored `schemaVersion`, in ascending order, and written back.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::database::store::StorageAdapter;
use crate::types::errors::MigrationError;
use crate::types::settings::{EmojiStyle, SCHEMA_VERSION_KEY, SETTINGS_KEY_EMOJI_STYLE};

/// A `major.minor.patch` store layout version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Layout written by the current code.
    pub const CURRENT: SchemaVersion = SchemaVersion::new(1, 1, 0);

    /// Stores that predate version stamping.
    pub const UNSTAMPED: SchemaVersion = SchemaVersion::new(1, 0, 1);
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SchemaVersion {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MigrationError::InvalidVersion(s.to_string());
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }
        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| invalid())?;
        }
        Ok(SchemaVersion::new(numbers[0], numbers[1], numbers[2]))
    }
}

/// A single layout transformation over the whole store snapshot.
pub type Migration = fn(Map<String, Value>) -> Map<String, Value>;

/// What a migration run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    pub applied: Vec<SchemaVersion>,
}

pub struct SchemaMigrationManager {
    migrations: BTreeMap<SchemaVersion, Migration>,
    current: SchemaVersion,
}

impl SchemaMigrationManager {
    /// Manager with every known migration registered.
    pub fn new() -> Self {
        let mut migrations: BTreeMap<SchemaVersion, Migration> = BTreeMap::new();
        migrations.insert(SchemaVersion::new(1, 1, 0), migrate_1_1_0);
        Self {
            migrations,
            current: SchemaVersion::CURRENT,
        }
    }

    /// Manager with a custom migration table. `current` is the highest registered version,
    /// or [`SchemaVersion::CURRENT`] if the table is empty.
    pub fn with_migrations(migrations: BTreeMap<SchemaVersion, Migration>) -> Self {
        let current = migrations
            .keys()
            .next_back()
            .copied()
            .unwrap_or(SchemaVersion::CURRENT);
        Self {
            migrations,
            current,
        }
    }

    pub fn current(&self) -> SchemaVersion {
        self.current
    }

    /// Version recorded in `snapshot`. A missing key means an unstamped store.
    pub fn stored_version(snapshot: &Map<String, Value>) -> Result<SchemaVersion, MigrationError> {
        match snapshot.get(SCHEMA_VERSION_KEY) {
            None | Some(Value::Null) => Ok(SchemaVersion::UNSTAMPED),
            Some(Value::String(s)) => s.parse(),
            Some(other) => Err(MigrationError::InvalidVersion(other.to_string())),
        }
    }

    /// Runs every migration newer than the stored version, oldest first.
    pub fn migrate(
        &self,
        snapshot: Map<String, Value>,
    ) -> Result<(Map<String, Value>, MigrationReport), MigrationError> {
        let from = Self::stored_version(&snapshot)?;
        if from > self.current {
            warn!(stored = %from, current = %self.current, "Stored schema is newer than this build; leaving it untouched");
            return Ok((
                snapshot,
                MigrationReport {
                    from,
                    to: from,
                    applied: Vec::new(),
                },
            ));
        }

        let mut data = snapshot;
        let mut applied = Vec::new();
        for (version, migration) in self
            .migrations
            .range((std::ops::Bound::Excluded(from), std::ops::Bound::Included(self.current)))
        {
            debug!(version = %version, "Applying schema migration");
            data = migration(data);
            data.insert(SCHEMA_VERSION_KEY.to_string(), Value::String(version.to_string()));
            applied.push(*version);
        }

        let to = applied.last().copied().unwrap_or(from);
        Ok((data, MigrationReport { from, to, applied }))
    }

    /// Snapshot, migrate and write back the whole store.
    ///
    /// The migrated snapshot is written over the old one in a single batch,
    /// then keys the migrations dropped are removed. A rejected write leaves
    /// the store as it was. Callers must hold the repository lock. Nothing is
    /// written when no migration applies.
    pub async fn apply_to_store(
        &self,
        storage: &StorageAdapter,
    ) -> Result<MigrationReport, MigrationError> {
        let snapshot = storage.get_all().await?;
        let old_keys: Vec<String> = snapshot.keys().cloned().collect();
        let (migrated, report) = self.migrate(snapshot)?;
        if report.applied.is_empty() {
            debug!(version = %report.from, "Schema already current");
            return Ok(report);
        }

        let dropped: Vec<String> = old_keys
            .into_iter()
            .filter(|key| !migrated.contains_key(key))
            .collect();
        storage.set(migrated).await?;
        if !dropped.is_empty() {
            storage.remove(dropped).await?;
        }
        info!(from = %report.from, to = %report.to, "Migrated store schema");
        Ok(report)
    }

    /// Records the current version and default settings on a fresh install.
    pub async fn stamp_current(&self, storage: &StorageAdapter) -> Result<(), MigrationError> {
        let mut items = Map::new();
        items.insert(
            SCHEMA_VERSION_KEY.to_string(),
            Value::String(self.current.to_string()),
        );
        if storage.get_one(SETTINGS_KEY_EMOJI_STYLE).await?.is_none() {
            items.insert(
                SETTINGS_KEY_EMOJI_STYLE.to_string(),
                Value::String(EmojiStyle::platform_default().as_str().to_string()),
            );
        }
        storage.set(items).await?;
        info!(version = %self.current, "Stamped schema version");
        Ok(())
    }
}

impl Default for SchemaMigrationManager {
    fn default() -> Self {
        Self::new()
    }
}

/// 1.1.0: emoji favicons split into system and image-set variants, and the
/// emoji style became a setting.
fn migrate_1_1_0(mut data: Map<String, Value>) -> Map<String, Value> {
    for value in data.values_mut() {
        let Some(favicon) = value
            .get_mut("signature")
            .and_then(|s| s.get_mut("favicon"))
            .and_then(Value::as_object_mut)
        else {
            continue;
        };
        if favicon.get("type").and_then(Value::as_str) == Some("emojiFavicon") {
            favicon.insert(
                "type".to_string(),
                Value::String("systemEmojiFavicon".to_string()),
            );
        }
    }
    data.insert(
        SETTINGS_KEY_EMOJI_STYLE.to_string(),
        Value::String(EmojiStyle::platform_default().as_str().to_string()),
    );
    data
}
