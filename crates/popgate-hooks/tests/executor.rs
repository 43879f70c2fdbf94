#![allow(missing_docs, unused_results)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use popgate_core::api::MockApiClient;
use popgate_core::{ApiClient, Campaign, TemplateType, TriggerContext};
use popgate_hooks::{
    HookContext, HookError, HookExecutor, HookRegistry, HookResult, PreDisplayHook, ResourceCache,
    register_default_hooks,
};
use serde_json::{Value, json};

// ─────────────────────────────────────────────────────────────────────────────
// Test hooks
// ─────────────────────────────────────────────────────────────────────────────

struct Counting {
    name: &'static str,
    calls: AtomicUsize,
}

impl Counting {
    fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PreDisplayHook for Counting {
    fn name(&self) -> &str {
        self.name
    }
    async fn execute(&self, context: &HookContext) -> Result<HookResult, HookError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(HookResult::ok(
            self.name,
            Some(json!({ "call": n, "campaign": context.campaign.id })),
        ))
    }
}

struct Slow {
    delay: Duration,
    timeout_ms: u64,
}

#[async_trait]
impl PreDisplayHook for Slow {
    fn name(&self) -> &str {
        "slow"
    }
    fn timeout_ms(&self) -> Option<u64> {
        Some(self.timeout_ms)
    }
    async fn execute(&self, _context: &HookContext) -> Result<HookResult, HookError> {
        tokio::time::sleep(self.delay).await;
        Ok(HookResult::ok("slow", Some(json!("late"))))
    }
}

struct Failing;

#[async_trait]
impl PreDisplayHook for Failing {
    fn name(&self) -> &str {
        "failing"
    }
    async fn execute(&self, _context: &HookContext) -> Result<HookResult, HookError> {
        Err(HookError::execution("failing", "backend said no"))
    }
}

struct Panicking;

#[async_trait]
impl PreDisplayHook for Panicking {
    fn name(&self) -> &str {
        "panicking"
    }
    async fn execute(&self, _context: &HookContext) -> Result<HookResult, HookError> {
        panic!("hook exploded");
    }
}

/// Reports failure but still hands back what it managed to load.
struct HalfLoaded;

#[async_trait]
impl PreDisplayHook for HalfLoaded {
    fn name(&self) -> &str {
        "half_loaded"
    }
    async fn execute(&self, _context: &HookContext) -> Result<HookResult, HookError> {
        let mut result = HookResult::failed("half_loaded", "second page of products failed");
        result.data = Some(json!({"products": ["p1"]}));
        Ok(result)
    }
}

struct Echo;

#[async_trait]
impl PreDisplayHook for Echo {
    fn name(&self) -> &str {
        "echo"
    }
    async fn execute(&self, context: &HookContext) -> Result<HookResult, HookError> {
        Ok(HookResult::ok(
            "echo",
            Some(json!({
                "session": context.session_id,
                "visitor": context.visitor_id,
                "product": context.triggering_product(),
            })),
        ))
    }
}

fn executor(template: TemplateType, hooks: Vec<Arc<dyn PreDisplayHook>>) -> HookExecutor {
    let mut registry = HookRegistry::new();
    for hook in hooks {
        registry.register(template, hook);
    }
    HookExecutor::new(
        Arc::new(registry),
        Arc::new(ResourceCache::new(Duration::from_secs(300))),
    )
}

fn api() -> Arc<dyn ApiClient> {
    Arc::new(MockApiClient::new())
}

fn campaign(id: &str) -> Campaign {
    Campaign::new(id, TemplateType::ProductUpsell)
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn second_call_within_ttl_is_served_from_cache() {
    let hook = Counting::new("products");
    let executor = executor(
        TemplateType::ProductUpsell,
        vec![hook.clone() as Arc<dyn PreDisplayHook>],
    );

    let first = executor
        .execute_hooks_for_campaign(&campaign("c1"), api(), "s1", None, None)
        .await;
    assert!(first.success);
    assert_eq!(first.results[0].execution_time_ms, 20);

    tokio::time::advance(Duration::from_secs(60)).await;
    let second = executor
        .execute_hooks_for_campaign(&campaign("c1"), api(), "s1", None, None)
        .await;
    assert_eq!(hook.calls(), 1);
    assert_eq!(second.results[0].execution_time_ms, 0);
    assert_eq!(second.resource("products"), first.resource("products"));
}

#[tokio::test(start_paused = true)]
async fn expired_entry_reruns_hook() {
    let hook = Counting::new("products");
    let executor = executor(
        TemplateType::ProductUpsell,
        vec![hook.clone() as Arc<dyn PreDisplayHook>],
    );

    executor
        .execute_hooks_for_campaign(&campaign("c1"), api(), "s1", None, None)
        .await;
    tokio::time::advance(Duration::from_secs(301)).await;
    let again = executor
        .execute_hooks_for_campaign(&campaign("c1"), api(), "s1", None, None)
        .await;
    assert_eq!(hook.calls(), 2);
    assert_eq!(again.resource("products").unwrap()["call"], 2);
}

#[tokio::test(start_paused = true)]
async fn campaigns_do_not_share_cache_entries() {
    let hook = Counting::new("products");
    let executor = executor(
        TemplateType::ProductUpsell,
        vec![hook.clone() as Arc<dyn PreDisplayHook>],
    );

    let a = executor
        .execute_hooks_for_campaign(&campaign("a"), api(), "s1", None, None)
        .await;
    let b = executor
        .execute_hooks_for_campaign(&campaign("b"), api(), "s1", None, None)
        .await;
    assert_eq!(hook.calls(), 2);
    assert_eq!(a.resource("products").unwrap()["campaign"], "a");
    assert_eq!(b.resource("products").unwrap()["campaign"], "b");
}

// ─────────────────────────────────────────────────────────────────────────────
// Isolation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn timeout_fails_one_hook_without_delaying_siblings() {
    let fast = Counting::new("fast");
    let executor = executor(
        TemplateType::ProductUpsell,
        vec![
            Arc::new(Slow {
                delay: Duration::from_secs(30),
                timeout_ms: 100,
            }) as Arc<dyn PreDisplayHook>,
            fast.clone(),
        ],
    );

    let start = tokio::time::Instant::now();
    let result = executor
        .execute_hooks_for_campaign(&campaign("c1"), api(), "s1", None, None)
        .await;
    assert_eq!(start.elapsed(), Duration::from_millis(100));

    assert!(!result.success);
    let slow = &result.results[0];
    assert!(!slow.success);
    assert!(slow.data.is_none());
    assert_eq!(slow.error.as_deref(), Some("Hook 'slow' timed out after 100ms"));
    assert_eq!(slow.execution_time_ms, 100);

    let fast_result = &result.results[1];
    assert!(fast_result.success);
    assert_eq!(fast_result.execution_time_ms, 20);
    assert!(result.resource("fast").is_some());
    assert!(result.resource("slow").is_none());
}

#[tokio::test]
async fn one_of_three_failing_blocks_aggregate_but_keeps_resources() {
    let executor = executor(
        TemplateType::ProductUpsell,
        vec![
            Counting::new("a") as Arc<dyn PreDisplayHook>,
            Arc::new(Failing),
            Counting::new("c"),
        ],
    );
    let result = executor
        .execute_hooks_for_campaign(&campaign("c1"), api(), "s1", None, None)
        .await;

    assert!(!result.success);
    let names: Vec<&str> = result.results.iter().map(|r| r.hook_name.as_str()).collect();
    assert_eq!(names, vec!["a", "failing", "c"]);
    assert_eq!(result.failed_hooks(), vec!["failing"]);
    assert_eq!(result.loaded_resources.len(), 2);
    assert!(result.resource("a").is_some());
    assert!(result.resource("c").is_some());
}

#[tokio::test]
async fn panicking_hook_is_contained() {
    let executor = executor(
        TemplateType::ProductUpsell,
        vec![Arc::new(Panicking) as Arc<dyn PreDisplayHook>, Counting::new("ok")],
    );
    let result = executor
        .execute_hooks_for_campaign(&campaign("c1"), api(), "s1", None, None)
        .await;

    assert!(!result.success);
    assert_eq!(
        result.results[0].error.as_deref(),
        Some("Hook 'panicking' aborted: panicked")
    );
    assert!(result.results[1].success);
}

#[tokio::test]
async fn data_from_unsuccessful_hook_is_neither_returned_nor_cached() {
    let executor = executor(
        TemplateType::ProductUpsell,
        vec![Arc::new(HalfLoaded) as Arc<dyn PreDisplayHook>],
    );
    let result = executor
        .execute_hooks_for_campaign(&campaign("c1"), api(), "s1", None, None)
        .await;

    assert!(!result.success);
    assert_eq!(result.failed_hooks(), vec!["half_loaded"]);
    assert!(result.results[0].data.is_none());
    assert!(result.loaded_resources.is_empty());
    assert!(executor.cache().get("c1", "half_loaded").is_none());
}

#[tokio::test]
async fn hooks_see_session_visitor_and_trigger_context() {
    let executor = executor(TemplateType::ProductUpsell, vec![Arc::new(Echo) as Arc<dyn PreDisplayHook>]);
    let trigger = TriggerContext::for_type("add_to_cart").with_product("P1");
    let result = executor
        .execute_hooks_for_campaign(&campaign("c1"), api(), "s1", Some("v1"), Some(trigger))
        .await;
    assert_eq!(
        result.resource("echo"),
        Some(&json!({"session": "s1", "visitor": "v1", "product": "P1"}))
    );
}

#[tokio::test]
async fn other_templates_run_nothing() {
    let hook = Counting::new("products");
    let executor = executor(
        TemplateType::ProductUpsell,
        vec![hook.clone() as Arc<dyn PreDisplayHook>],
    );
    let result = executor
        .execute_hooks_for_campaign(
            &Campaign::new("c1", TemplateType::Newsletter),
            api(),
            "s1",
            None,
            None,
        )
        .await;
    assert!(result.success);
    assert!(result.results.is_empty());
    assert_eq!(hook.calls(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Built-in hooks
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn default_hooks_for_cart_abandonment() {
    let mut api = MockApiClient::new();
    api.expect_fetch_products()
        .times(1)
        .returning(|ids| Ok(json!({ "ids": ids })));
    api.expect_fetch_cart()
        .times(1)
        .returning(|_| Ok(json!({"total": 99.0, "items": 3})));
    api.expect_preload_image()
        .times(1)
        .returning(|_| Err(popgate_core::ApiError::Network("cdn down".into())));

    let mut registry = HookRegistry::new();
    register_default_hooks(&mut registry);
    let executor = HookExecutor::new(Arc::new(registry), Arc::new(ResourceCache::default()));

    let campaign = Campaign::new("c9", TemplateType::CartAbandonment)
        .with_content(json!({"productIds": ["P1", "P2"]}))
        .with_design(json!({"backgroundImageUrl": "https://cdn/bg.jpg"}));
    let api: Arc<dyn ApiClient> = Arc::new(api);
    let result = executor
        .execute_hooks_for_campaign(&campaign, api, "sess", None, None)
        .await;

    assert!(result.success, "image failures never block: {result:?}");
    assert_eq!(result.resource("cart_snapshot").unwrap()["items"], 3);
    assert_eq!(
        result.resource("product_data").unwrap()["products"]["ids"],
        json!(["P1", "P2"])
    );
    assert_eq!(result.resource("background_image").unwrap()["loaded"], false);
}

#[tokio::test]
async fn preview_skips_cart_but_loads_products() {
    let mut api = MockApiClient::new();
    api.expect_fetch_recommendations()
        .times(1)
        .returning(|limit, _| Ok(Value::from(limit)));

    let mut registry = HookRegistry::new();
    register_default_hooks(&mut registry);
    let executor = HookExecutor::new(Arc::new(registry), Arc::new(ResourceCache::default()))
        .with_preview_mode(true);

    let campaign = Campaign::new("c9", TemplateType::CartAbandonment);
    let api: Arc<dyn ApiClient> = Arc::new(api);
    let result = executor
        .execute_hooks_for_campaign(&campaign, api, "sess", None, None)
        .await;

    assert!(result.success);
    assert!(result.resource("cart_snapshot").is_none());
    assert_eq!(result.resource("product_data").unwrap()["products"], 4);
}
