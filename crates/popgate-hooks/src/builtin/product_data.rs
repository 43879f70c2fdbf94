//! Product data for product-centric templates.

use async_trait::async_trait;
use popgate_core::ids::same_id;
use serde_json::{Value, json};

use super::{field, product_ids};
use crate::errors::HookError;
use crate::handler::PreDisplayHook;
use crate::types::{HookContext, HookResult};

const NAME: &str = "product_data";
const DEFAULT_RECOMMENDATION_LIMIT: usize = 4;

/// Fetches the campaign's configured products, or recommendations when it
/// lists none.
///
/// The product that triggered the campaign is dropped when
/// `exclude_triggering_product` is set and otherwise moved to the front.
#[derive(Debug, Clone)]
pub struct ProductDataHook {
    recommendation_limit: usize,
}

impl ProductDataHook {
    /// Hook asking for `limit` recommendations when no products are listed.
    #[must_use]
    pub fn new(recommendation_limit: usize) -> Self {
        Self {
            recommendation_limit,
        }
    }
}

impl Default for ProductDataHook {
    fn default() -> Self {
        Self::new(DEFAULT_RECOMMENDATION_LIMIT)
    }
}

#[async_trait]
impl PreDisplayHook for ProductDataHook {
    fn name(&self) -> &str {
        NAME
    }

    fn run_in_preview(&self) -> bool {
        true
    }

    fn timeout_ms(&self) -> Option<u64> {
        Some(5_000)
    }

    fn description(&self) -> Option<&str> {
        Some("Loads configured or recommended products")
    }

    async fn execute(&self, context: &HookContext) -> Result<HookResult, HookError> {
        let content = &context.campaign.content_config;
        let exclude_trigger = field(content, "exclude_triggering_product", "excludeTriggeringProduct")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let trigger = context.triggering_product();

        let mut ids = product_ids(content);
        if let Some(trigger) = trigger {
            if exclude_trigger {
                ids.retain(|id| !same_id(id, trigger));
            } else if let Some(pos) = ids.iter().position(|id| same_id(id, trigger)) {
                let id = ids.remove(pos);
                ids.insert(0, id);
            }
        }

        if ids.is_empty() {
            let limit = field(content, "recommendation_limit", "recommendationLimit")
                .and_then(Value::as_u64)
                .and_then(|limit| usize::try_from(limit).ok())
                .unwrap_or(self.recommendation_limit);
            let exclude: Vec<String> = trigger
                .filter(|_| exclude_trigger)
                .map(ToString::to_string)
                .into_iter()
                .collect();
            let products = context
                .api
                .fetch_recommendations(limit, &exclude)
                .await
                .map_err(|source| HookError::api(NAME, source))?;
            return Ok(HookResult::ok(
                NAME,
                Some(json!({ "source": "recommendations", "products": products })),
            ));
        }

        let products = context
            .api
            .fetch_products(&ids)
            .await
            .map_err(|source| HookError::api(NAME, source))?;
        Ok(HookResult::ok(
            NAME,
            Some(json!({ "source": "configured", "productIds": ids, "products": products })),
        ))
    }
}
