//! Moves images embedded directly in content records into the asset registry.

use crate::encoding::decode_data_url;
use crate::store::AssetStore;
use serde_json::{Map, Value};
use site_content::{record_id, ContentStore, SectionKey};
use site_types::{AssetCategory, AssetError};

const IMAGE_FIELDS: [&str; 3] = ["photo", "image", "logo"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub moved: usize,
    /// Inline images the registry refused (unsupported type, too large, malformed).
    pub failed: usize,
}

fn category_for(section: SectionKey) -> AssetCategory {
    match section {
        SectionKey::Team => AssetCategory::Team,
        SectionKey::Clients => AssetCategory::Clients,
        SectionKey::Gallery => AssetCategory::Gallery,
        _ => AssetCategory::General,
    }
}

/// Walk every list section and replace `data:image/...` values in image fields
/// with the filename of a new asset. Each rewritten record is its own content
/// update. A record whose content write fails has its new asset removed again
/// and the error is returned.
pub fn extract_inline_images(
    content: &ContentStore,
    assets: &AssetStore,
) -> Result<MigrationReport, AssetError> {
    let mut report = MigrationReport::default();
    for section in SectionKey::ALL.iter().copied().filter(SectionKey::is_list) {
        let records = content.get(section);
        for record in records.as_array().into_iter().flatten() {
            let Some(id) = record_id(record) else {
                continue;
            };
            for field in IMAGE_FIELDS {
                let Some(data) = record.get(field).and_then(Value::as_str) else {
                    continue;
                };
                if !data.starts_with("data:image/") {
                    continue;
                }
                let Some((mime_type, bytes)) = decode_data_url(data) else {
                    tracing::warn!(section = %section, id, field, "inline image is malformed, left in place");
                    report.failed += 1;
                    continue;
                };
                let name = format!("{}-{}-{}", section, id, field);
                let asset = match assets.save_asset(&bytes, &mime_type, &name, category_for(section)) {
                    Ok(asset) => asset,
                    Err(e @ (AssetError::InvalidFile(_) | AssetError::FileTooLarge { .. })) => {
                        tracing::warn!(section = %section, id, field, error = %e, "inline image left in place");
                        report.failed += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                let mut patch = Map::new();
                patch.insert(field.to_string(), Value::String(asset.filename.clone()));
                if let Err(e) = content.update_record(section, id, patch) {
                    if let Err(cleanup) = assets.delete_asset(&asset.filename) {
                        tracing::warn!(filename = %asset.filename, error = %cleanup, "could not remove orphaned asset");
                    }
                    return Err(e.into());
                }
                report.moved += 1;
            }
        }
    }
    tracing::info!(moved = report.moved, failed = report.failed, "inline images extracted");
    Ok(report)
}
