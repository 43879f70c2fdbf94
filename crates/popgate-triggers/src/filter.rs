//! Product / collection filter shared by `add_to_cart` and `product_view`.

use popgate_core::ids::{contains_id, id_from_value};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Product and collection allow-lists.
///
/// A product matches if its id is listed **or** any of its collections is
/// listed. With both lists empty every product matches. Ids compare on their
/// last path segment, so `gid://shop/Product/42` matches `42`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductFilter {
    /// Allowed product ids.
    #[serde(deserialize_with = "id_list")]
    pub product_ids: Vec<String>,
    /// Allowed collection ids.
    #[serde(deserialize_with = "id_list")]
    pub collection_ids: Vec<String>,
}

impl ProductFilter {
    /// Whether neither list is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.product_ids.is_empty() && self.collection_ids.is_empty()
    }

    /// Whether a product with `product_id` in `collections` passes.
    #[must_use]
    pub fn matches(&self, product_id: Option<&str>, collections: &[String]) -> bool {
        if self.is_empty() {
            return true;
        }
        let product_match = product_id.is_some_and(|id| contains_id(&self.product_ids, id));
        product_match
            || collections
                .iter()
                .any(|c| contains_id(&self.collection_ids, c))
    }
}

fn id_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .iter()
        .filter_map(id_from_value)
        .collect())
}
