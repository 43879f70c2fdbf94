//! Trigger-derived context threaded from trigger evaluation into hook execution.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a detector learned while firing.
///
/// For example an `add_to_cart` detector records the product that was
/// added, so a product-data hook can exclude or prioritize it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerContext {
    /// Trigger type that produced this context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_type: Option<String>,
    /// Product id involved in the trigger, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    /// Raw event detail, if the trigger was event-driven.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl TriggerContext {
    /// Context for a trigger type with nothing else to report.
    #[must_use]
    pub fn for_type(trigger_type: impl Into<String>) -> Self {
        Self {
            trigger_type: Some(trigger_type.into()),
            ..Self::default()
        }
    }

    /// Attach a product id.
    #[must_use]
    pub fn with_product(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    /// Attach an event detail payload.
    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}
