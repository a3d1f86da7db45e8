//! Directory-backed key-value store: one JSON document per key.

use crate::entry_size;
use parking_lot::Mutex;
use site_types::{KeyValueStore, StorageError};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const EXT: &str = "json";

/// Stores each key as `<dir>/<key>.json`. Writes land in a sibling temp file
/// and are renamed into place, so a failed write never leaves a partial blob.
pub struct JsonFileKvStore {
    dir: PathBuf,
    quota: Option<u64>,
    write_lock: Mutex<()>,
}

impl JsonFileKvStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            StorageError::Unavailable(format!("cannot create {}: {}", dir.display(), e))
        })?;
        Ok(Self {
            dir,
            quota: None,
            write_lock: Mutex::new(()),
        })
    }

    pub fn with_quota(mut self, limit: u64) -> Self {
        self.quota = Some(limit);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::Other(format!("invalid key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.{}", key, EXT)))
    }

    fn usage_excluding(&self, key: &str) -> Result<u64, StorageError> {
        let mut total = 0;
        for other in self.keys()? {
            if other == key {
                continue;
            }
            let len = fs::metadata(self.path_for(&other)?)
                .map(|m| m.len())
                .unwrap_or(0);
            total += other.len() as u64 + len;
        }
        Ok(total)
    }
}

impl KeyValueStore for JsonFileKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == ErrorKind::InvalidData => Err(StorageError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            }),
            Err(e) => Err(StorageError::Unavailable(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let _guard = self.write_lock.lock();
        if let Some(limit) = self.quota {
            let attempted = self.usage_excluding(key)? + entry_size(key, value);
            if attempted > limit {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    attempted,
                    limit,
                });
            }
        }
        let tmp = path.with_extension(format!("{}.tmp", EXT));
        let written = fs::File::create(&tmp)
            .and_then(|mut f| {
                f.write_all(value.as_bytes())?;
                f.sync_all()
            })
            .and_then(|_| fs::rename(&tmp, &path));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            tracing::warn!(key = %key, error = %e, "file store write failed");
            return Err(StorageError::Unavailable(e.to_string()));
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let _guard = self.write_lock.lock();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Unavailable(e.to_string())),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries =
            fs::read_dir(&self.dir).map_err(|e| StorageError::Unavailable(e.to_string()))?;
        let mut keys = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
