//! Asset store for uploaded images: validation, inline encoding, registry
//! lifecycle (cleanup, stats, backup) and the optional upload server path.

mod encoding;
mod migrate;
mod publisher;
mod store;
mod upload;
mod validate;

pub use encoding::{decode_data_url, decoded_size, to_data_url};
pub use migrate::{extract_inline_images, MigrationReport};
pub use publisher::{AssetPublisher, StoredAsset, DEFAULT_UPLOAD_TIMEOUT};
pub use site_types::{
    AssetCategory, AssetError, AssetExport, AssetRecord, AssetRegistry, CategoryStats,
    StorageStats, UploadError,
};
pub use store::{AssetStore, AssetStoreConfig, ASSET_EXPORT_VERSION};
pub use upload::{HttpUploadClient, UploadClient};
pub use validate::{extension_for, ACCEPTED_MIME_TYPES, DEFAULT_MAX_FILE_SIZE};
