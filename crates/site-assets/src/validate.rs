//! Upload validation: accepted image types and the size ceiling.

use site_types::AssetError;

/// 5 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

pub const ACCEPTED_MIME_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
];

pub fn extension_for(mime_type: &str) -> Option<&'static str> {
    match mime_type.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        _ => None,
    }
}

/// Check type and size; returns the file extension to use.
pub(crate) fn validate_file(
    len: usize,
    mime_type: &str,
    max_file_size: u64,
) -> Result<&'static str, AssetError> {
    let ext = extension_for(mime_type).ok_or_else(|| {
        AssetError::InvalidFile(format!(
            "unsupported type {:?}, expected one of {}",
            mime_type,
            ACCEPTED_MIME_TYPES.join(", ")
        ))
    })?;
    if len == 0 {
        return Err(AssetError::InvalidFile("file is empty".to_string()));
    }
    if len as u64 > max_file_size {
        return Err(AssetError::FileTooLarge {
            size: len as u64,
            limit: max_file_size,
        });
    }
    Ok(ext)
}
