//! `data:` URL encoding used for inline images.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// Split a base64 `data:` URL into its MIME type and decoded bytes.
pub fn decode_data_url(data: &str) -> Option<(String, Vec<u8>)> {
    let rest = data.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    Some((mime.to_string(), bytes))
}

/// True byte length of the image carried by a `data:` URL.
pub fn decoded_size(data: &str) -> Option<u64> {
    decode_data_url(data).map(|(_, bytes)| bytes.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_what_it_encodes() {
        let bytes = vec![0u8, 1, 2, 250, 251, 252, 253];
        let url = to_data_url("image/png", &bytes);
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(decode_data_url(&url), Some(("image/png".to_string(), bytes)));
    }

    #[test]
    fn size_is_the_raw_length_not_the_encoded_length() {
        let url = to_data_url("image/gif", &[7u8; 1000]);
        assert_eq!(decoded_size(&url), Some(1000));
        assert!(url.len() > 1000);
    }

    #[test]
    fn non_base64_urls_are_rejected() {
        assert_eq!(decode_data_url("data:image/svg+xml,<svg/>"), None);
        assert_eq!(decode_data_url("team/1_abc.png"), None);
    }
}
