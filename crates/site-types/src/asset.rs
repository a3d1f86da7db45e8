//! Asset registry records and aggregate stats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Registry document stored under [`crate::keys::ASSETS`]: filename -> record.
pub type AssetRegistry = BTreeMap<String, AssetRecord>;

/// Folder an uploaded image belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Team,
    Clients,
    Gallery,
    General,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 4] = [
        AssetCategory::Team,
        AssetCategory::Clients,
        AssetCategory::Gallery,
        AssetCategory::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::Team => "team",
            AssetCategory::Clients => "clients",
            AssetCategory::Gallery => "gallery",
            AssetCategory::General => "general",
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown asset category: {}", s))
    }
}

/// One uploaded image, inline-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    /// `category/<timestamp>_<random6>.<ext>`; unique within the registry.
    pub filename: String,
    pub original_name: String,
    pub category: AssetCategory,
    pub mime_type: String,
    /// `data:<mime>;base64,<payload>`.
    pub data: String,
    pub uploaded_at: DateTime<Utc>,
    /// Raw byte length of the image.
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub count: usize,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub total_assets: usize,
    pub total_size: u64,
    pub per_category: BTreeMap<AssetCategory, CategoryStats>,
}

impl StorageStats {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a AssetRecord>) -> Self {
        let mut stats = StorageStats::default();
        for record in records {
            stats.total_assets += 1;
            stats.total_size += record.size;
            let entry = stats.per_category.entry(record.category).or_default();
            entry.count += 1;
            entry.size += record.size;
        }
        stats
    }
}

/// Backup document produced by `export_assets`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetExport {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub assets: AssetRegistry,
    pub stats: StorageStats,
}
