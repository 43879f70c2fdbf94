//! `product_view`: the current page shows a matching product.

use std::time::Duration;

use popgate_core::TriggerContext;
use serde::Deserialize;
use serde_json::Value;

use super::parse_config;
use crate::detector::{Detector, DetectorCore, DetectorEnv, ResolveCallback};
use crate::errors::Result;
use crate::filter::ProductFilter;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProductViewConfig {
    #[serde(flatten)]
    filter: ProductFilter,
    delay: u64,
}

/// Fires (after an optional delay) on a product page whose product passes
/// the filter. Resolves unmet anywhere else.
#[derive(Debug)]
pub struct ProductViewDetector {
    core: DetectorCore,
    env: DetectorEnv,
    filter: ProductFilter,
    delay: Duration,
}

impl ProductViewDetector {
    /// Build from `{ product_ids, collection_ids, delay }`.
    pub fn from_config(trigger_type: &str, config: &Value, env: &DetectorEnv) -> Result<Self> {
        let cfg: ProductViewConfig = parse_config(trigger_type, config)?;
        Ok(Self {
            core: DetectorCore::new(trigger_type),
            env: env.clone(),
            filter: cfg.filter,
            delay: Duration::from_millis(cfg.delay),
        })
    }
}

impl Detector for ProductViewDetector {
    fn trigger_type(&self) -> &str {
        self.core.trigger_type()
    }

    fn start(&self, on_resolved: ResolveCallback) {
        if !self.core.arm(on_resolved) {
            return;
        }
        let resolver = self.core.resolver();
        let Some(product_id) = self.env.page.product_id() else {
            let _ = resolver.unmet("not a product page");
            return;
        };
        let collections = self.env.page.collection_ids();
        if !self.filter.matches(Some(&product_id), &collections) {
            let _ = resolver.unmet(format!("product {product_id} does not match"));
            return;
        }

        let context = TriggerContext::for_type(self.core.trigger_type()).with_product(product_id);
        if self.delay.is_zero() {
            let _ = resolver.trigger(context);
            return;
        }
        let deadline = tokio::time::Instant::now() + self.delay;
        self.core.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = resolver.trigger(context);
        });
    }

    fn stop(&self) {
        self.core.stop();
    }

    fn is_active(&self) -> bool {
        self.core.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Detection;
    use parking_lot::Mutex;
    use popgate_core::{PageState, SignalBus};
    use popgate_settings::TriggerSettings;
    use serde_json::json;
    use std::sync::Arc;

    fn env_on(product: Option<&str>, collections: &[&str]) -> DetectorEnv {
        let page = PageState::new();
        page.set_product(product.map(ToString::to_string));
        page.set_collections(collections.iter().map(ToString::to_string).collect());
        DetectorEnv::new(SignalBus::default(), Arc::new(page), TriggerSettings::default())
    }

    fn run(env: &DetectorEnv, config: Value) -> (ProductViewDetector, Arc<Mutex<Vec<Detection>>>) {
        let det = ProductViewDetector::from_config("product_view", &config, env).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        det.start(Box::new(move |d| seen2.lock().push(d)));
        (det, seen)
    }

    #[test]
    fn matching_product_fires() {
        let env = env_on(Some("P1"), &[]);
        let (_det, seen) = run(&env, json!({"enabled": true, "product_ids": ["P1"]}));
        let seen = seen.lock();
        let Detection::Triggered(ctx) = &seen[0] else {
            panic!("expected trigger");
        };
        assert_eq!(ctx.product_id.as_deref(), Some("P1"));
    }

    #[test]
    fn collection_match_fires() {
        let env = env_on(Some("P7"), &["summer"]);
        let (_det, seen) = run(
            &env,
            json!({"enabled": true, "product_ids": ["P1"], "collection_ids": ["summer"]}),
        );
        assert!(seen.lock()[0].is_triggered());
    }

    #[test]
    fn non_product_page_is_unmet() {
        let env = env_on(None, &[]);
        let (_det, seen) = run(&env, json!({"enabled": true}));
        assert!(matches!(seen.lock()[0], Detection::Unmet(_)));
    }

    #[test]
    fn non_matching_product_is_unmet() {
        let env = env_on(Some("P2"), &[]);
        let (_det, seen) = run(&env, json!({"enabled": true, "product_ids": ["P1"]}));
        assert!(matches!(seen.lock()[0], Detection::Unmet(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_postpones_trigger() {
        let env = env_on(Some("P1"), &[]);
        let (_det, seen) = run(&env, json!({"enabled": true, "delay": 2000}));
        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert!(seen.lock().is_empty());
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(seen.lock().len(), 1);
    }
}
