//! Persistent Store backends: in-memory, JSON-file directory and SQLite.

mod file_kv;
mod memory_kv;

#[cfg(any(test, feature = "test-util"))]
mod faulty;
#[cfg(feature = "sqlite")]
mod sqlite_kv;

pub use file_kv::JsonFileKvStore;
pub use memory_kv::InMemoryKvStore;
pub use site_types::{KeyValueStore, StorageError};

#[cfg(any(test, feature = "test-util"))]
pub use faulty::FaultyKvStore;
#[cfg(feature = "sqlite")]
pub use sqlite_kv::SqliteKvStore;

/// Bytes a key/value pair counts against a quota.
pub(crate) fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}
