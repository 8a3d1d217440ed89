//! File-URL scan over untyped upstream payloads

use serde_json::Value;

/// Depth-first search for the first string value that looks like an
/// absolute URL.
///
/// Objects are visited in key order and arrays in index order, so the scan
/// is deterministic for a given payload structure.
pub fn find_first_url(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) if is_absolute_url(s) => Some(s),
        Value::Array(items) => items.iter().find_map(find_first_url),
        Value::Object(map) => map.values().find_map(find_first_url),
        _ => None,
    }
}

fn is_absolute_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_url_nested_in_objects_and_arrays() {
        let payload = json!({
            "meta": {"title": "clip", "id": 42},
            "results": [
                {"quality": "720p", "link": "https://files.example/x.mp4"},
                {"quality": "1080p", "link": "https://files.example/y.mp4"},
            ],
        });
        assert_eq!(
            find_first_url(&payload),
            Some("https://files.example/x.mp4")
        );
    }

    #[test]
    fn ignores_non_url_strings_and_scalars() {
        let payload = json!({
            "status": "ok",
            "count": 3,
            "flag": true,
            "nothing": null,
            "path": "/relative/file.mp4",
        });
        assert_eq!(find_first_url(&payload), None);
    }

    #[test]
    fn scan_is_deterministic() {
        let payload = json!({
            "a": ["https://first.example/a", "https://second.example/b"],
            "z": "https://third.example/c",
        });
        let first = find_first_url(&payload);
        for _ in 0..10 {
            assert_eq!(find_first_url(&payload), first);
        }
        assert_eq!(first, Some("https://first.example/a"));
    }

    #[test]
    fn bare_url_string_payload_matches() {
        let payload = json!("http://files.example/direct.bin");
        assert_eq!(
            find_first_url(&payload),
            Some("http://files.example/direct.bin")
        );
    }
}
