//! Registry of uploaded images, persisted as one document under [`keys::ASSETS`].

use crate::encoding::{decoded_size, to_data_url};
use crate::validate::{validate_file, DEFAULT_MAX_FILE_SIZE};
use chrono::Duration;
use parking_lot::RwLock;
use serde_json::Value;
use site_types::{
    keys, AssetCategory, AssetError, AssetExport, AssetRecord, AssetRegistry, Clock,
    KeyValueStore, StorageStats, SystemClock,
};
use std::sync::Arc;
use uuid::Uuid;

pub const ASSET_EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone)]
pub struct AssetStoreConfig {
    pub max_file_size: u64,
}

impl Default for AssetStoreConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Owns the asset registry. Every mutation builds the next registry, persists
/// it, and only then replaces the in-memory copy, so a rejected write changes
/// nothing.
pub struct AssetStore {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: AssetStoreConfig,
    registry: RwLock<Option<AssetRegistry>>,
}

fn random6() -> String {
    Uuid::new_v4().simple().to_string()[..6].to_string()
}

impl AssetStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(kv, Arc::new(SystemClock), AssetStoreConfig::default())
    }

    pub fn with_config(
        kv: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: AssetStoreConfig,
    ) -> Self {
        Self {
            kv,
            clock,
            config,
            registry: RwLock::new(None),
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.config.max_file_size
    }

    fn load(&self) -> AssetRegistry {
        match self.kv.get(keys::ASSETS) {
            Ok(Some(blob)) => serde_json::from_str(&blob).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "asset registry is corrupt, starting empty");
                AssetRegistry::new()
            }),
            Ok(None) => AssetRegistry::new(),
            Err(e) => {
                tracing::warn!(error = %e, "asset registry unreadable, starting empty");
                AssetRegistry::new()
            }
        }
    }

    fn read<R>(&self, f: impl FnOnce(&AssetRegistry) -> R) -> R {
        {
            let guard = self.registry.read();
            if let Some(reg) = guard.as_ref() {
                return f(reg);
            }
        }
        let mut guard = self.registry.write();
        let reg = guard.get_or_insert_with(|| self.load());
        f(reg)
    }

    fn persist(&self, registry: &AssetRegistry) -> Result<(), AssetError> {
        let blob = serde_json::to_string(registry)
            .map_err(|e| AssetError::Serialization(e.to_string()))?;
        self.kv.set(keys::ASSETS, &blob)?;
        Ok(())
    }

    /// Apply `f` to a copy of the registry and commit it if `f` reports a change.
    fn commit<R>(
        &self,
        f: impl FnOnce(&mut AssetRegistry) -> Result<(bool, R), AssetError>,
    ) -> Result<R, AssetError> {
        let mut guard = self.registry.write();
        let current = guard.get_or_insert_with(|| self.load());
        let mut next = current.clone();
        let (changed, out) = f(&mut next)?;
        if changed {
            if let Err(e) = self.persist(&next) {
                tracing::warn!(error = %e, "asset registry write failed, kept previous registry");
                return Err(e);
            }
            *current = next;
        }
        Ok(out)
    }

    /// Validate type and size before anything else, then add the image to the
    /// registry under `category/<timestamp>_<random6>.<ext>`.
    pub fn save_asset(
        &self,
        bytes: &[u8],
        mime_type: &str,
        original_name: &str,
        category: AssetCategory,
    ) -> Result<AssetRecord, AssetError> {
        let ext = validate_file(bytes.len(), mime_type, self.config.max_file_size)?;
        let mime_type = mime_type.to_ascii_lowercase();
        let now = self.clock.now();
        let record = self.commit(|registry| {
            let mut filename;
            loop {
                filename = format!(
                    "{}/{}_{}.{}",
                    category,
                    now.timestamp_millis(),
                    random6(),
                    ext
                );
                if !registry.contains_key(&filename) {
                    break;
                }
            }
            let record = AssetRecord {
                filename: filename.clone(),
                original_name: original_name.to_string(),
                category,
                data: to_data_url(&mime_type, bytes),
                mime_type: mime_type.clone(),
                uploaded_at: now,
                size: bytes.len() as u64,
            };
            registry.insert(filename, record.clone());
            Ok((true, record))
        })?;
        tracing::info!(filename = %record.filename, size = record.size, "asset saved");
        Ok(record)
    }

    pub fn get_asset(&self, filename: &str) -> Option<AssetRecord> {
        self.read(|reg| reg.get(filename).cloned())
    }

    pub fn get_all_assets(&self) -> Vec<AssetRecord> {
        self.read(|reg| reg.values().cloned().collect())
    }

    pub fn get_assets_by_category(&self, category: AssetCategory) -> Vec<AssetRecord> {
        self.read(|reg| {
            reg.values()
                .filter(|r| r.category == category)
                .cloned()
                .collect()
        })
    }

    /// Removing an unknown filename is a no-op.
    pub fn delete_asset(&self, filename: &str) -> Result<(), AssetError> {
        let removed = self.commit(|registry| {
            let removed = registry.remove(filename).is_some();
            Ok((removed, removed))
        })?;
        if removed {
            tracing::info!(filename = %filename, "asset deleted");
        }
        Ok(())
    }

    /// Drop every asset uploaded more than `max_age_days` ago; one write at most.
    pub fn cleanup_old_assets(&self, max_age_days: u32) -> Result<usize, AssetError> {
        let cutoff = Duration::try_days(i64::from(max_age_days))
            .and_then(|age| self.clock.now().checked_sub_signed(age));
        let Some(cutoff) = cutoff else {
            tracing::debug!(max_age_days, "cleanup cutoff predates every timestamp");
            return Ok(0);
        };
        let removed = self.commit(|registry| {
            let before = registry.len();
            registry.retain(|_, r| r.uploaded_at >= cutoff);
            let removed = before - registry.len();
            Ok((removed > 0, removed))
        })?;
        tracing::info!(removed, max_age_days, "old assets cleaned up");
        Ok(removed)
    }

    pub fn get_storage_stats(&self) -> StorageStats {
        self.read(|reg| StorageStats::from_records(reg.values()))
    }

    pub fn export_assets(&self) -> AssetExport {
        self.read(|reg| AssetExport {
            version: ASSET_EXPORT_VERSION.to_string(),
            exported_at: self.clock.now(),
            assets: reg.clone(),
            stats: StorageStats::from_records(reg.values()),
        })
    }

    /// Replace the registry with the one in a backup document. The document must
    /// carry a `1.x` version marker and an `assets` object whose keys match the
    /// records' filenames; anything else is rejected without touching storage.
    /// Sizes are recomputed from each record's payload.
    pub fn import_assets(&self, doc: &Value) -> Result<usize, AssetError> {
        let version = doc
            .get("version")
            .and_then(Value::as_str)
            .ok_or_else(|| AssetError::ImportValidation("missing version marker".to_string()))?;
        if version != ASSET_EXPORT_VERSION && !version.starts_with("1.") {
            return Err(AssetError::ImportValidation(format!(
                "unsupported version {}",
                version
            )));
        }
        let assets = doc
            .get("assets")
            .filter(|a| a.is_object())
            .ok_or_else(|| AssetError::ImportValidation("missing assets object".to_string()))?;
        let mut imported: AssetRegistry = serde_json::from_value(assets.clone())
            .map_err(|e| AssetError::ImportValidation(e.to_string()))?;
        if let Some((key, _)) = imported.iter().find(|(k, r)| **k != r.filename) {
            return Err(AssetError::ImportValidation(format!(
                "entry {} does not match its filename",
                key
            )));
        }
        for record in imported.values_mut() {
            if let Some(size) = decoded_size(&record.data) {
                record.size = size;
            }
        }
        let count = imported.len();
        self.commit(|registry| {
            *registry = imported;
            Ok((true, ()))
        })?;
        tracing::info!(count, "assets imported");
        Ok(count)
    }
}
