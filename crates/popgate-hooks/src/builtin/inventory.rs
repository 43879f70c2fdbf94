//! Stock levels for the campaign's products.

use async_trait::async_trait;

use super::product_ids;
use crate::errors::HookError;
use crate::handler::PreDisplayHook;
use crate::types::{HookContext, HookResult};

const NAME: &str = "inventory";

/// Fetches inventory counts for the campaign's configured product ids.
///
/// A campaign without product ids succeeds with no data.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryHook;

#[async_trait]
impl PreDisplayHook for InventoryHook {
    fn name(&self) -> &str {
        NAME
    }

    fn timeout_ms(&self) -> Option<u64> {
        Some(5_000)
    }

    fn description(&self) -> Option<&str> {
        Some("Loads inventory counts for configured products")
    }

    async fn execute(&self, context: &HookContext) -> Result<HookResult, HookError> {
        let ids = product_ids(&context.campaign.content_config);
        if ids.is_empty() {
            return Ok(HookResult::ok(NAME, None));
        }
        let inventory = context
            .api
            .fetch_inventory(&ids)
            .await
            .map_err(|source| HookError::api(NAME, source))?;
        Ok(HookResult::ok(NAME, Some(inventory)))
    }
}
