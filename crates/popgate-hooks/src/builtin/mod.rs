//! Built-in resource hooks and their default template wiring.

mod background_image;
mod cart_snapshot;
mod inventory;
mod product_data;

use std::sync::Arc;

use popgate_core::TemplateType;
use popgate_core::ids::id_from_value;
use serde_json::Value;

pub use background_image::BackgroundImageHook;
pub use cart_snapshot::CartSnapshotHook;
pub use inventory::InventoryHook;
pub use product_data::ProductDataHook;

use crate::handler::PreDisplayHook;
use crate::registry::HookRegistry;

const PRODUCT_TEMPLATES: &[TemplateType] = &[
    TemplateType::ProductUpsell,
    TemplateType::CartAbandonment,
    TemplateType::FlashSale,
];

const CART_TEMPLATES: &[TemplateType] = &[TemplateType::CartAbandonment, TemplateType::FreeShipping];

const INVENTORY_TEMPLATES: &[TemplateType] = &[TemplateType::ProductUpsell, TemplateType::FlashSale];

const IMAGE_TEMPLATES: &[TemplateType] = &[
    TemplateType::Newsletter,
    TemplateType::FlashSale,
    TemplateType::SpinToWin,
    TemplateType::ScratchCard,
    TemplateType::CartAbandonment,
    TemplateType::ProductUpsell,
    TemplateType::FreeShipping,
    TemplateType::Countdown,
    TemplateType::Announcement,
];

/// Register every built-in hook under its templates.
pub fn register_default_hooks(registry: &mut HookRegistry) {
    let product: Arc<dyn PreDisplayHook> = Arc::new(ProductDataHook::default());
    let cart: Arc<dyn PreDisplayHook> = Arc::new(CartSnapshotHook);
    let inventory: Arc<dyn PreDisplayHook> = Arc::new(InventoryHook);
    let image: Arc<dyn PreDisplayHook> = Arc::new(BackgroundImageHook::default());

    registry.register_for(PRODUCT_TEMPLATES, &product);
    registry.register_for(CART_TEMPLATES, &cart);
    registry.register_for(INVENTORY_TEMPLATES, &inventory);
    registry.register_for(IMAGE_TEMPLATES, &image);
}

/// `config[snake]`, falling back to `config[camel]`.
fn field<'a>(config: &'a Value, snake: &str, camel: &str) -> Option<&'a Value> {
    config
        .get(snake)
        .or_else(|| config.get(camel))
        .filter(|value| !value.is_null())
}

/// Product ids listed in a campaign's content config. Numeric ids are
/// accepted and stringified.
fn product_ids(content: &Value) -> Vec<String> {
    field(content, "product_ids", "productIds")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(id_from_value).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_wire_templates() {
        let mut registry = HookRegistry::new();
        register_default_hooks(&mut registry);

        let names = |template| -> Vec<String> {
            registry
                .get_hooks(template)
                .iter()
                .map(|hook| hook.name().to_string())
                .collect()
        };
        assert_eq!(
            names(TemplateType::ProductUpsell),
            vec!["product_data", "inventory", "background_image"]
        );
        assert_eq!(
            names(TemplateType::CartAbandonment),
            vec!["product_data", "cart_snapshot", "background_image"]
        );
        assert_eq!(names(TemplateType::Newsletter), vec!["background_image"]);
        assert!(names(TemplateType::Other).is_empty());
        assert_eq!(registry.list_all().len(), 4);
    }

    #[test]
    fn product_ids_accept_both_spellings_and_numbers() {
        assert_eq!(
            product_ids(&json!({"product_ids": ["a", 7, "", " ", null]})),
            vec!["a", "7"]
        );
        assert_eq!(product_ids(&json!({"productIds": ["b"]})), vec!["b"]);
        assert!(product_ids(&json!({})).is_empty());
    }
}
