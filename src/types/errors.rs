use thiserror::Error;

use super::tab::TabId;

// === StoreError ===

/// Errors reported by a key-value store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected the operation.
    #[error("Store backend error: {0}")]
    Backend(String),
    /// A stored value could not be encoded or decoded.
    #[error("Store serialization error: {0}")]
    Serialization(String),
    /// The write would exceed the store's size limits.
    #[error("Store quota exceeded for '{key}': {bytes} bytes (limit {limit})")]
    QuotaExceeded { key: String, bytes: usize, limit: usize },
    /// The backend is no longer reachable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

// === RepositoryError ===

/// Errors related to tab record persistence and matching.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The underlying store failed.
    #[error("Repository store error: {0}")]
    Store(#[from] StoreError),
    /// A record could not be converted to or from its stored shape.
    #[error("Repository serialization error for tab {id}: {message}")]
    Serialization { id: TabId, message: String },
    /// Stored data contradicts a structural guarantee of the matching logic.
    #[error("Repository invariant violated: {0}")]
    InvariantViolation(String),
}

impl RepositoryError {
    /// Fatal errors signal a logic or data-corruption bug and must not be swallowed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RepositoryError::InvariantViolation(_))
    }
}

// === SettingsError ===

/// Errors related to the settings keyspace.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings store error: {0}")]
    Store(#[from] StoreError),
    /// The provided settings value is invalid.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}

// === MigrationError ===

/// Errors related to schema migration.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration store error: {0}")]
    Store(#[from] StoreError),
    /// The stored schema version could not be parsed.
    #[error("Invalid schema version: {0}")]
    InvalidVersion(String),
}

// === ConfigError ===

/// Errors related to loading the core configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the config file.
    #[error("Config I/O error: {0}")]
    Io(String),
    /// The config file is malformed.
    #[error("Config parse error: {0}")]
    Parse(String),
}

// === HostError ===

/// Errors reported by the host (content-script) boundary.
#[derive(Debug, Error)]
pub enum HostError {
    /// The outbound channel to the host is closed.
    #[error("Host disconnected")]
    Disconnected,
    /// The host refused the command.
    #[error("Host rejected command: {0}")]
    Rejected(String),
}
