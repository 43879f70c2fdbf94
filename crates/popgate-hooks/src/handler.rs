//! Resource hook trait.
//!
//! A [`PreDisplayHook`] loads one kind of resource a popup needs before it
//! can render. Hooks are registered per template type in the
//! [`HookRegistry`](crate::registry::HookRegistry) and run by the
//! [`HookExecutor`](crate::executor::HookExecutor).

use async_trait::async_trait;

use crate::errors::HookError;
use crate::types::{HookContext, HookResult};

/// A pre-display resource loader.
///
/// Hooks hold no per-campaign state; repeated loads are served from the
/// executor's cache instead.
#[async_trait]
pub trait PreDisplayHook: Send + Sync {
    /// Unique name, also the cache and `loaded_resources` key.
    fn name(&self) -> &str;

    /// Whether to run during admin preview. Default: `false`.
    fn run_in_preview(&self) -> bool {
        false
    }

    /// Timeout in milliseconds. `None` uses the configured default.
    fn timeout_ms(&self) -> Option<u64> {
        None
    }

    /// Optional human-readable description.
    fn description(&self) -> Option<&str> {
        None
    }

    /// Load the resource.
    ///
    /// The executor records elapsed time and converts errors into failed
    /// results.
    async fn execute(&self, context: &HookContext) -> Result<HookResult, HookError>;
}
