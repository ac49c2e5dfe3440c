//! Persistence layer for tab signatures.
//!
//! Provides the [`KeyValueStore`] abstraction over the host's key-value
//! storage, two backends (in-memory and SQLite) and the [`StorageAdapter`]
//! the repositories talk to.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabsig::database::{SqliteStore, StorageAdapter, StoreQuota};
//!
//! let store = SqliteStore::open("signatures.db", StoreQuota::sync_storage())
//!     .expect("failed to open store");
//! let adapter = StorageAdapter::new(Arc::new(store));
//! ```

pub mod connection;
pub mod memory_store;
pub mod migrations;
pub mod sqlite_store;
pub mod store;

pub use connection::Database;
pub use memory_store::MemoryStore;
pub use sqlite_store::SqliteStore;
pub use store::{KeyQuery, KeyValueStore, StorageAdapter, StorageKey, StoreQuota};
