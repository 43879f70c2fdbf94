//! Hook data types.
//!
//! [`HookContext`] is what a hook sees; [`HookResult`] is what it produces;
//! [`CampaignHooksResult`] aggregates one campaign's results.

use std::collections::BTreeMap;
use std::sync::Arc;

use popgate_core::{ApiClient, Campaign, TemplateType, TriggerContext};
use serde::Serialize;
use serde_json::Value;

/// Everything a hook may read while loading resources for one campaign.
#[derive(Clone)]
pub struct HookContext {
    /// Campaign being prepared.
    pub campaign: Campaign,
    /// Client for backend calls.
    pub api: Arc<dyn ApiClient>,
    /// Storefront session id.
    pub session_id: String,
    /// Known visitor id, if any.
    pub visitor_id: Option<String>,
    /// Whether this is an admin preview render.
    pub preview_mode: bool,
    /// What the trigger evaluation discovered.
    pub trigger_context: Option<TriggerContext>,
}

impl HookContext {
    /// Context for `campaign` with no visitor, preview, or trigger data.
    pub fn new(campaign: Campaign, api: Arc<dyn ApiClient>, session_id: impl Into<String>) -> Self {
        Self {
            campaign,
            api,
            session_id: session_id.into(),
            visitor_id: None,
            preview_mode: false,
            trigger_context: None,
        }
    }

    /// Set the visitor id.
    #[must_use]
    pub fn with_visitor(mut self, visitor_id: Option<String>) -> Self {
        self.visitor_id = visitor_id;
        self
    }

    /// Set preview mode.
    #[must_use]
    pub fn with_preview(mut self, preview_mode: bool) -> Self {
        self.preview_mode = preview_mode;
        self
    }

    /// Attach the trigger context.
    #[must_use]
    pub fn with_trigger_context(mut self, trigger_context: Option<TriggerContext>) -> Self {
        self.trigger_context = trigger_context;
        self
    }

    /// Product id discovered by the trigger, if any.
    pub fn triggering_product(&self) -> Option<&str> {
        self.trigger_context
            .as_ref()
            .and_then(|ctx| ctx.product_id.as_deref())
    }
}

impl std::fmt::Debug for HookContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookContext")
            .field("campaign_id", &self.campaign.id)
            .field("session_id", &self.session_id)
            .field("visitor_id", &self.visitor_id)
            .field("preview_mode", &self.preview_mode)
            .field("trigger_context", &self.trigger_context)
            .finish_non_exhaustive()
    }
}

/// Outcome of one hook.
///
/// Built only through the constructors, so a failed result never carries
/// data.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResult {
    /// Whether the hook succeeded.
    pub success: bool,
    /// Loaded data, successful results only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure message, failed results only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Hook that produced this result.
    pub hook_name: String,
    /// Wall time spent, 0 for cache hits and skips.
    pub execution_time_ms: u64,
}

impl HookResult {
    /// Successful result; `null` data is stored as no data.
    pub fn ok(hook_name: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            data: data.filter(|value| !value.is_null()),
            error: None,
            hook_name: hook_name.into(),
            execution_time_ms: 0,
        }
    }

    /// Failed result.
    pub fn failed(hook_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            hook_name: hook_name.into(),
            execution_time_ms: 0,
        }
    }

    /// Set the measured execution time.
    #[must_use]
    pub fn with_elapsed_ms(mut self, execution_time_ms: u64) -> Self {
        self.execution_time_ms = execution_time_ms;
        self
    }

    /// Successful result with data.
    pub fn has_data(&self) -> bool {
        self.success && self.data.is_some()
    }
}

/// Every hook result for one campaign.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignHooksResult {
    /// True iff every hook succeeded.
    pub success: bool,
    /// Per-hook results in registration order.
    pub results: Vec<HookResult>,
    /// Hook name → data, for every successful result that carried data.
    pub loaded_resources: BTreeMap<String, Value>,
}

impl CampaignHooksResult {
    /// Aggregate `results`.
    pub fn from_results(results: Vec<HookResult>) -> Self {
        let success = results.iter().all(|result| result.success);
        let loaded_resources = results
            .iter()
            .filter(|result| result.success)
            .filter_map(|result| {
                result
                    .data
                    .as_ref()
                    .map(|data| (result.hook_name.clone(), data.clone()))
            })
            .collect();
        Self {
            success,
            results,
            loaded_resources,
        }
    }

    /// Names of the hooks that failed.
    pub fn failed_hooks(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|result| !result.success)
            .map(|result| result.hook_name.as_str())
            .collect()
    }

    /// Data loaded by `hook_name`.
    pub fn resource(&self, hook_name: &str) -> Option<&Value> {
        self.loaded_resources.get(hook_name)
    }
}

/// Registration summary of one hook.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookInfo {
    /// Hook name.
    pub name: String,
    /// Template types the hook is registered under.
    pub template_types: Vec<TemplateType>,
    /// Whether the hook runs during preview.
    pub run_in_preview: bool,
    /// Declared timeout, if any.
    pub timeout_ms: Option<u64>,
    /// Human-readable description.
    pub description: Option<String>,
}
