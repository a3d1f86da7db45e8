//! Environment configuration for the API binary.

use site_auth::Credentials;
use site_storage::{InMemoryKvStore, JsonFileKvStore};
use site_types::{KeyValueStore, StorageError};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Per-origin quota browsers typically grant.
pub const DEFAULT_STORAGE_QUOTA: u64 = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    File,
    Sqlite,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "file" => Ok(StorageBackend::File),
            "sqlite" => Ok(StorageBackend::Sqlite),
            other => Err(format!("unknown backend {:?} (memory, file, sqlite)", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub listen: SocketAddr,
    pub storage: StorageBackend,
    pub data_dir: PathBuf,
    pub storage_quota: u64,
    pub upload_url: Option<String>,
    pub upload_timeout: Duration,
    pub credentials: Credentials,
}

fn parse<T: FromStr>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(s) => s.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let listen = parse(
            "SITE_LISTEN",
            lookup("SITE_LISTEN"),
            SocketAddr::from(([0, 0, 0, 0], 8080)),
        )?;
        let storage = parse("SITE_STORAGE", lookup("SITE_STORAGE"), StorageBackend::File)?;
        let data_dir = lookup("SITE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./site-data"));
        let storage_quota = parse(
            "SITE_STORAGE_QUOTA",
            lookup("SITE_STORAGE_QUOTA"),
            DEFAULT_STORAGE_QUOTA,
        )?;
        let upload_url = lookup("SITE_UPLOAD_URL").filter(|u| !u.trim().is_empty());
        let timeout_secs: u64 = parse(
            "SITE_UPLOAD_TIMEOUT_SECS",
            lookup("SITE_UPLOAD_TIMEOUT_SECS"),
            12,
        )?;
        let credentials = Credentials::new(
            lookup("SITE_ADMIN_USER").unwrap_or_else(|| "admin".to_string()),
            lookup("SITE_ADMIN_PASSWORD").unwrap_or_else(|| "admin123".to_string()),
        );
        Ok(Self {
            listen,
            storage,
            data_dir,
            storage_quota,
            upload_url,
            upload_timeout: Duration::from_secs(timeout_secs),
            credentials,
        })
    }

    /// Open the configured Persistent Store backend.
    pub fn open_store(&self) -> Result<Arc<dyn KeyValueStore>, ConfigError> {
        match self.storage {
            StorageBackend::Memory => Ok(Arc::new(InMemoryKvStore::with_quota(self.storage_quota))),
            StorageBackend::File => Ok(Arc::new(
                JsonFileKvStore::open(&self.data_dir)?.with_quota(self.storage_quota),
            )),
            StorageBackend::Sqlite => self.open_sqlite(),
        }
    }

    #[cfg(feature = "sqlite")]
    fn open_sqlite(&self) -> Result<Arc<dyn KeyValueStore>, ConfigError> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| {
            StorageError::Unavailable(format!("cannot create {}: {}", self.data_dir.display(), e))
        })?;
        let store = site_storage::SqliteKvStore::new(self.data_dir.join("site.db"))?;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "sqlite"))]
    fn open_sqlite(&self) -> Result<Arc<dyn KeyValueStore>, ConfigError> {
        Err(ConfigError::Invalid {
            var: "SITE_STORAGE",
            reason: "built without the sqlite feature".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.listen.port(), 8080);
        assert_eq!(config.storage, StorageBackend::File);
        assert_eq!(config.storage_quota, DEFAULT_STORAGE_QUOTA);
        assert_eq!(config.upload_url, None);
        assert_eq!(config.upload_timeout, Duration::from_secs(12));
        assert_eq!(config.credentials.username, "admin");
    }

    #[test]
    fn values_are_read_and_validated() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("SITE_LISTEN", "127.0.0.1:9000"),
            ("SITE_STORAGE", "Memory"),
            ("SITE_UPLOAD_URL", "http://localhost:3001"),
            ("SITE_UPLOAD_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();
        assert_eq!(config.listen.port(), 9000);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.upload_url.as_deref(), Some("http://localhost:3001"));
        assert!(config.open_store().is_ok());

        let err = ApiConfig::from_lookup(lookup(&[("SITE_STORAGE_QUOTA", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "SITE_STORAGE_QUOTA", .. }));
    }

    #[test]
    fn file_backend_opens_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().join("data").to_string_lossy().to_string();
        let config = ApiConfig::from_lookup(lookup(&[("SITE_DATA_DIR", dir_str.as_str())])).unwrap();
        let store = config.open_store().unwrap();
        store.set("websiteData", "{}").unwrap();
        assert!(dir.path().join("data").is_dir());
    }
}
