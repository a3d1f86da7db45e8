//! In-memory key-value store with an optional byte quota.

use crate::entry_size;
use parking_lot::RwLock;
use site_types::{KeyValueStore, StorageError};
use std::collections::HashMap;

/// In-memory KeyValueStore. With a quota set it rejects writes the way a
/// browser's per-origin storage does once the limit is reached.
pub struct InMemoryKvStore {
    entries: RwLock<HashMap<String, String>>,
    quota: Option<u64>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota: None,
        }
    }

    pub fn with_quota(limit: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota: Some(limit),
        }
    }

    /// Bytes currently counted against the quota.
    pub fn usage(&self) -> u64 {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| entry_size(k, v))
            .sum()
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for InMemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self.entries.write();
        if let Some(limit) = self.quota {
            let others: u64 = guard
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| entry_size(k, v))
                .sum();
            let attempted = others + entry_size(key, value);
            if attempted > limit {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    attempted,
                    limit,
                });
            }
        }
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let store = InMemoryKvStore::new();
        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        store.remove("a").unwrap();
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn quota_rejects_and_keeps_previous_value() {
        let store = InMemoryKvStore::with_quota(20);
        store.set("k", "small").unwrap();
        let err = store.set("k", &"x".repeat(64)).unwrap_err();
        assert!(err.is_quota());
        assert_eq!(store.get("k").unwrap().as_deref(), Some("small"));
    }

    #[test]
    fn overwriting_a_key_does_not_double_count() {
        let store = InMemoryKvStore::with_quota(10);
        store.set("k", "12345678").unwrap();
        store.set("k", "87654321").unwrap();
        assert_eq!(store.usage(), 9);
    }
}
