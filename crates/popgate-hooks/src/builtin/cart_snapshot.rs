//! Visitor cart contents for cart-centric templates.

use async_trait::async_trait;

use crate::errors::HookError;
use crate::handler::PreDisplayHook;
use crate::types::{HookContext, HookResult};

const NAME: &str = "cart_snapshot";

/// Fetches the visitor's cart by session id.
#[derive(Debug, Clone, Copy, Default)]
pub struct CartSnapshotHook;

#[async_trait]
impl PreDisplayHook for CartSnapshotHook {
    fn name(&self) -> &str {
        NAME
    }

    fn timeout_ms(&self) -> Option<u64> {
        Some(5_000)
    }

    fn description(&self) -> Option<&str> {
        Some("Loads the visitor's current cart")
    }

    async fn execute(&self, context: &HookContext) -> Result<HookResult, HookError> {
        if context.session_id.is_empty() {
            return Err(HookError::execution(NAME, "no session id"));
        }
        let cart = context
            .api
            .fetch_cart(&context.session_id)
            .await
            .map_err(|source| HookError::api(NAME, source))?;
        Ok(HookResult::ok(NAME, Some(cart)))
    }
}
