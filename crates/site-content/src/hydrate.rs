//! Overlay of a stored content blob onto the compiled-in defaults.

use serde_json::Value;
use site_types::ContentTree;

pub(crate) fn same_shape(default: &Value, stored: &Value) -> bool {
    match default {
        Value::Object(_) => stored.is_object(),
        Value::Array(_) => stored.is_array(),
        _ => !stored.is_null(),
    }
}

pub(crate) fn shape_name(default: &Value) -> &'static str {
    match default {
        Value::Object(_) => "an object",
        Value::Array(_) => "a list",
        _ => "a value",
    }
}

/// Key-by-key overlay: a stored key overrides its default, a missing key keeps
/// the default. A stored section whose shape disagrees with its default (an
/// object where a list belongs, or null) is treated as corrupt and the default
/// is kept for that key only. Keys this build does not know are carried along.
pub fn overlay_onto_defaults(defaults: &ContentTree, stored: &Value) -> ContentTree {
    let mut tree = defaults.clone();
    let Some(stored) = stored.as_object() else {
        tracing::warn!("stored content is not an object, using defaults");
        return tree;
    };
    for (key, value) in stored {
        match defaults.get(key) {
            Some(default) if !same_shape(default, value) => {
                tracing::warn!(section = %key, "stored section has the wrong shape, using default");
            }
            _ => {
                tree.insert(key.clone(), value.clone());
            }
        }
    }
    tree
}

/// Parse a raw blob and overlay it. Unparseable input yields the defaults.
pub(crate) fn overlay_blob(defaults: &ContentTree, blob: &str) -> ContentTree {
    match serde_json::from_str::<Value>(blob) {
        Ok(stored) => overlay_onto_defaults(defaults, &stored),
        Err(e) => {
            tracing::warn!(error = %e, "stored content is corrupt, using defaults");
            defaults.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defaults() -> ContentTree {
        json!({"homePage": {"hero": "h"}, "services": [{"id": 1}]})
            .as_object()
            .unwrap()
            .clone()
    }

    #[test]
    fn present_keys_override_missing_keys_default() {
        let tree = overlay_onto_defaults(&defaults(), &json!({"services": []}));
        assert_eq!(tree["services"], json!([]));
        assert_eq!(tree["homePage"], json!({"hero": "h"}));
    }

    #[test]
    fn wrong_shape_keeps_default_for_that_key_only() {
        let tree = overlay_onto_defaults(
            &defaults(),
            &json!({"services": {"oops": true}, "homePage": {"hero": "x"}}),
        );
        assert_eq!(tree["services"], json!([{"id": 1}]));
        assert_eq!(tree["homePage"], json!({"hero": "x"}));
    }

    #[test]
    fn unknown_keys_survive() {
        let tree = overlay_onto_defaults(&defaults(), &json!({"blog": [1]}));
        assert_eq!(tree["blog"], json!([1]));
    }

    #[test]
    fn garbage_blob_yields_defaults() {
        assert_eq!(overlay_blob(&defaults(), "{not json"), defaults());
        assert_eq!(overlay_blob(&defaults(), "[1,2]"), defaults());
    }
}
