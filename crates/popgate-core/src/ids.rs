//! Product and collection id helpers.
//!
//! Storefronts hand out ids either bare (`42`) or as global ids
//! (`gid://shop/Product/42`), sometimes as JSON numbers. Trigger filters and
//! resource hooks must agree on when two of them name the same thing.

use serde_json::Value;

/// Render an id that may arrive as a JSON string or number.
///
/// Empty and whitespace-only strings are not ids.
#[must_use]
pub fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The comparable part of an id: its last `/` segment, trimmed.
#[must_use]
pub fn normalize_id(id: &str) -> &str {
    let id = id.trim();
    id.rsplit('/').next().unwrap_or(id).trim()
}

/// Whether `a` and `b` name the same product or collection.
#[must_use]
pub fn same_id(a: &str, b: &str) -> bool {
    normalize_id(a) == normalize_id(b)
}

/// Whether `list` contains an id equal to `id` under [`same_id`].
#[must_use]
pub fn contains_id(list: &[String], id: &str) -> bool {
    list.iter().any(|candidate| same_id(candidate, id))
}
