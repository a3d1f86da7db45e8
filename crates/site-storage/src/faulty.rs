//! Fault-injecting wrapper for exercising write-failure paths.

use site_types::{KeyValueStore, StorageError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Delegates to an inner store, but fails chosen writes with `QuotaExceeded`
/// and can pretend the whole store is unavailable.
pub struct FaultyKvStore {
    inner: Arc<dyn KeyValueStore>,
    writes: AtomicUsize,
    /// 1-based index of the write to fail; 0 disables.
    fail_on: AtomicUsize,
    fail_all_writes: AtomicBool,
    fail_removes: AtomicBool,
    unavailable: AtomicBool,
}

impl FaultyKvStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
            fail_on: AtomicUsize::new(0),
            fail_all_writes: AtomicBool::new(false),
            fail_removes: AtomicBool::new(false),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Fail the `n`th `set` from now on (1 = the next one).
    pub fn fail_nth_write(&self, n: usize) {
        let seen = self.writes.load(Ordering::SeqCst);
        self.fail_on.store(seen + n, Ordering::SeqCst);
    }

    pub fn fail_all_writes(&self, on: bool) {
        self.fail_all_writes.store(on, Ordering::SeqCst);
    }

    /// Make every `remove` fail while reads and `set` keep working.
    pub fn fail_removes(&self, on: bool) {
        self.fail_removes.store(on, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, on: bool) {
        self.unavailable.store(on, Ordering::SeqCst);
    }

    /// Number of `set` calls attempted so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("storage disabled".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for FaultyKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_available()?;
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_available()?;
        let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_all_writes.load(Ordering::SeqCst) || self.fail_on.load(Ordering::SeqCst) == n {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                attempted: value.len() as u64,
                limit: 0,
            });
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_available()?;
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("cannot remove {}", key)));
        }
        self.inner.remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.check_available()?;
        self.inner.keys()
    }
}
