//! Hook executor.
//!
//! Runs every hook registered for a campaign's template concurrently, one
//! task per hook. Each hook goes through the same pipeline:
//!
//! 1. cache lookup; a hit returns the cached data without running the hook
//! 2. preview skip for hooks that do not run in preview
//! 3. `execute` raced against the hook's timeout
//! 4. successful data is cached
//!
//! A hook that fails, times out, or panics yields a failed [`HookResult`];
//! siblings are never cancelled or delayed by it.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use popgate_core::{ApiClient, Campaign, TriggerContext};
use popgate_settings::HookSettings;
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{Instrument, debug, instrument, warn};

use crate::cache::ResourceCache;
use crate::errors::HookError;
use crate::handler::PreDisplayHook;
use crate::registry::HookRegistry;
use crate::types::{CampaignHooksResult, HookContext, HookResult};

/// Runs a campaign's resource hooks.
pub struct HookExecutor {
    registry: Arc<HookRegistry>,
    cache: Arc<ResourceCache>,
    default_timeout: Duration,
    preview_mode: bool,
}

impl HookExecutor {
    /// Executor over `registry`, sharing `cache`.
    #[must_use]
    pub fn new(registry: Arc<HookRegistry>, cache: Arc<ResourceCache>) -> Self {
        Self {
            registry,
            cache,
            default_timeout: HookSettings::default().default_timeout(),
            preview_mode: false,
        }
    }

    /// Executor with a fresh cache and timeout taken from `settings`.
    #[must_use]
    pub fn from_settings(registry: Arc<HookRegistry>, settings: &HookSettings) -> Self {
        Self::new(registry, Arc::new(ResourceCache::from_settings(settings)))
            .with_default_timeout(settings.default_timeout())
    }

    /// Timeout for hooks that declare none.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Run as an admin preview.
    #[must_use]
    pub fn with_preview_mode(mut self, preview_mode: bool) -> Self {
        self.preview_mode = preview_mode;
        self
    }

    /// Whether this executor runs in preview mode.
    pub fn preview_mode(&self) -> bool {
        self.preview_mode
    }

    /// The hook registry.
    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    /// The shared cache.
    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    /// Run every hook registered for `campaign`'s template.
    ///
    /// Never fails; results come back in registration order.
    #[instrument(skip_all, fields(campaign_id = %campaign.id, template_type = %campaign.template_type))]
    pub async fn execute_hooks_for_campaign(
        &self,
        campaign: &Campaign,
        api: Arc<dyn ApiClient>,
        session_id: &str,
        visitor_id: Option<&str>,
        trigger_context: Option<TriggerContext>,
    ) -> CampaignHooksResult {
        let hooks = self.registry.get_hooks(campaign.template_type);
        if hooks.is_empty() {
            debug!("no hooks registered for template");
            return CampaignHooksResult::from_results(Vec::new());
        }

        let context = Arc::new(
            HookContext::new(campaign.clone(), api, session_id)
                .with_visitor(visitor_id.map(ToString::to_string))
                .with_preview(self.preview_mode)
                .with_trigger_context(trigger_context),
        );
        let start = Instant::now();

        let tasks: Vec<_> = hooks
            .iter()
            .map(|hook| {
                let pipeline = run_pipeline(
                    Arc::clone(hook),
                    Arc::clone(&context),
                    Arc::clone(&self.cache),
                    self.timeout_for(hook.as_ref()),
                );
                tokio::spawn(pipeline.in_current_span())
            })
            .collect();
        let joined = join_all(tasks).await;

        let results: Vec<HookResult> = hooks
            .iter()
            .zip(joined)
            .map(|(hook, joined)| joined.unwrap_or_else(|error| aborted(hook.name(), &error)))
            .collect();
        let aggregate = CampaignHooksResult::from_results(results);

        debug!(
            hooks = aggregate.results.len(),
            success = aggregate.success,
            duration_ms = start.elapsed().as_millis(),
            "hook execution complete"
        );
        aggregate
    }

    /// Forget cached data for `campaign_id`.
    pub fn clear_campaign_cache(&self, campaign_id: &str) -> usize {
        self.cache.clear_campaign(campaign_id)
    }

    /// Forget all cached data.
    pub fn clear_cache(&self) {
        self.cache.clear();
        debug!("cleared hook cache");
    }

    fn timeout_for(&self, hook: &dyn PreDisplayHook) -> Duration {
        hook.timeout_ms().map_or(self.default_timeout, Duration::from_millis)
    }
}

impl std::fmt::Debug for HookExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookExecutor")
            .field("registry", &self.registry)
            .field("cached", &self.cache.len())
            .field("default_timeout", &self.default_timeout)
            .field("preview_mode", &self.preview_mode)
            .finish()
    }
}

async fn run_pipeline(
    hook: Arc<dyn PreDisplayHook>,
    context: Arc<HookContext>,
    cache: Arc<ResourceCache>,
    timeout: Duration,
) -> HookResult {
    let name = hook.name().to_string();
    let campaign_id = context.campaign.id.as_str();

    if let Some(data) = cache.get(campaign_id, &name) {
        debug!(hook_name = %name, "hook served from cache");
        return HookResult::ok(name, Some(data));
    }
    if context.preview_mode && !hook.run_in_preview() {
        debug!(hook_name = %name, "hook skipped in preview");
        return HookResult::ok(name, None);
    }

    let start = Instant::now();
    let outcome = tokio::time::timeout(timeout, hook.execute(&context)).await;
    let elapsed_ms = millis(start.elapsed());

    let mut result = match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(error)) => {
            warn!(hook_name = %name, error = %error, "hook failed");
            HookResult::failed(&name, error.to_string())
        }
        Err(_) => {
            let error = HookError::Timeout {
                name: name.clone(),
                timeout_ms: millis(timeout),
            };
            warn!(hook_name = %name, timeout_ms = millis(timeout), "hook timed out");
            HookResult::failed(&name, error.to_string())
        }
    }
    .with_elapsed_ms(elapsed_ms);
    result.hook_name.clone_from(&name);
    if !result.success && result.data.take().is_some() {
        debug!(hook_name = %name, "dropped data from failed hook");
    }

    if let Some(data) = &result.data {
        cache.insert(campaign_id, &name, data.clone());
    }
    debug!(hook_name = %name, success = result.success, elapsed_ms, "hook finished");
    result
}

fn aborted(name: &str, error: &JoinError) -> HookResult {
    let message = if error.is_panic() {
        "panicked"
    } else {
        "cancelled"
    };
    let error = HookError::Aborted {
        name: name.to_string(),
        message: message.to_string(),
    };
    warn!(hook_name = %name, error = %error, "hook task aborted");
    HookResult::failed(name, error.to_string())
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::HookError;
    use async_trait::async_trait;
    use popgate_core::TemplateType;
    use popgate_core::api::MockApiClient;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Static {
        name: &'static str,
        data: Option<Value>,
        in_preview: bool,
        calls: AtomicUsize,
    }

    impl Static {
        fn new(name: &'static str, data: Option<Value>) -> Arc<Self> {
            Arc::new(Self {
                name,
                data,
                in_preview: false,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PreDisplayHook for Static {
        fn name(&self) -> &str {
            self.name
        }
        fn run_in_preview(&self) -> bool {
            self.in_preview
        }
        async fn execute(&self, _context: &HookContext) -> Result<HookResult, HookError> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HookResult::ok(self.name, self.data.clone()))
        }
    }

    struct Failing;

    #[async_trait]
    impl PreDisplayHook for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        async fn execute(&self, _context: &HookContext) -> Result<HookResult, HookError> {
            Err(HookError::execution("failing", "upstream unavailable"))
        }
    }

    fn executor(hooks: Vec<Arc<dyn PreDisplayHook>>) -> HookExecutor {
        let mut registry = HookRegistry::new();
        for hook in hooks {
            registry.register(TemplateType::ProductUpsell, hook);
        }
        HookExecutor::new(Arc::new(registry), Arc::new(ResourceCache::default()))
    }

    fn campaign() -> Campaign {
        Campaign::new("c1", TemplateType::ProductUpsell)
    }

    fn api() -> Arc<dyn ApiClient> {
        Arc::new(MockApiClient::new())
    }

    #[tokio::test]
    async fn no_hooks_succeeds_empty() {
        let executor = executor(Vec::new());
        let result = executor
            .execute_hooks_for_campaign(&campaign(), api(), "s1", None, None)
            .await;
        assert!(result.success);
        assert!(result.results.is_empty());
    }

    #[tokio::test]
    async fn failure_does_not_cache_and_is_reported() {
        let executor = executor(vec![Arc::new(Failing) as Arc<dyn PreDisplayHook>]);
        let result = executor
            .execute_hooks_for_campaign(&campaign(), api(), "s1", None, None)
            .await;
        assert!(!result.success);
        let failed = &result.results[0];
        assert_eq!(
            failed.error.as_deref(),
            Some("Hook 'failing' failed: upstream unavailable")
        );
        assert!(executor.cache().is_empty());
    }

    #[tokio::test]
    async fn preview_skips_hooks_not_marked_for_preview() {
        let hook = Static::new("cart", Some(json!({"items": []})));
        let executor =
            executor(vec![hook.clone() as Arc<dyn PreDisplayHook>]).with_preview_mode(true);
        let result = executor
            .execute_hooks_for_campaign(&campaign(), api(), "s1", None, None)
            .await;
        assert!(result.success);
        assert!(result.results[0].data.is_none());
        assert_eq!(hook.calls.load(Ordering::SeqCst), 0);
        assert!(executor.cache().is_empty());
    }

    #[tokio::test]
    async fn data_less_success_is_not_cached() {
        let hook = Static::new("empty", None);
        let executor = executor(vec![hook.clone() as Arc<dyn PreDisplayHook>]);
        for _ in 0..2 {
            let _ = executor
                .execute_hooks_for_campaign(&campaign(), api(), "s1", None, None)
                .await;
        }
        assert_eq!(hook.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn clear_campaign_cache_forces_rerun() {
        let hook = Static::new("products", Some(json!([1])));
        let executor = executor(vec![hook.clone() as Arc<dyn PreDisplayHook>]);
        let _ = executor
            .execute_hooks_for_campaign(&campaign(), api(), "s1", None, None)
            .await;
        assert_eq!(executor.clear_campaign_cache("c1"), 1);
        let _ = executor
            .execute_hooks_for_campaign(&campaign(), api(), "s1", None, None)
            .await;
        assert_eq!(hook.calls.load(Ordering::SeqCst), 2);

        executor.clear_cache();
        assert!(executor.cache().is_empty());
    }

    #[test]
    fn declared_timeout_overrides_default() {
        struct Quick;
        #[async_trait]
        impl PreDisplayHook for Quick {
            fn name(&self) -> &str {
                "quick"
            }
            fn timeout_ms(&self) -> Option<u64> {
                Some(250)
            }
            async fn execute(&self, _context: &HookContext) -> Result<HookResult, HookError> {
                Ok(HookResult::ok("quick", None))
            }
        }
        let executor = executor(Vec::new()).with_default_timeout(Duration::from_secs(3));
        assert_eq!(executor.timeout_for(&Quick), Duration::from_millis(250));
        assert_eq!(executor.timeout_for(&Failing), Duration::from_secs(3));
    }
}
