//! Persistent Store abstraction and the error enums shared across the workspace.

use crate::SectionKey;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Durable string key-value storage (the browser's per-origin store, or a stand-in).
///
/// Implementations must make `set` all-or-nothing: a failed write leaves the
/// previous value for that key readable.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage quota exceeded writing {key}: {attempted} bytes over a {limit} byte limit")]
    QuotaExceeded {
        key: String,
        attempted: u64,
        limit: u64,
    },
    #[error("corrupt data under {key}: {reason}")]
    Corrupt { key: String, reason: String },
    #[error("storage error: {0}")]
    Other(String),
}

impl StorageError {
    pub fn is_quota(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("section {0} is not a list section")]
    NotAList(SectionKey),
    #[error("section {section} must hold {expected}")]
    ShapeMismatch {
        section: SectionKey,
        expected: &'static str,
    },
    #[error("no record {id} in {section}")]
    RecordNotFound { section: SectionKey, id: i64 },
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("import rejected: {0}")]
    ImportValidation(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("invalid file: {0}")]
    InvalidFile(String),
    #[error("file too large: {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("import rejected: {0}")]
    ImportValidation(String),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("content: {0}")]
    Content(#[from] ContentError),
}

/// Failures talking to the upload collaborator. Callers fall back to inline storage.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("network error: {0}")]
    Network(String),
    #[error("upload timed out after {0:?}")]
    Timeout(Duration),
    #[error("upload rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ActionLogError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials, {remaining_attempts} attempts left")]
    InvalidCredentials { remaining_attempts: u32 },
    #[error("too many failed attempts, locked until {until}")]
    LockedOut { until: DateTime<Utc> },
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("serialization error: {0}")]
    Serialization(String),
}
