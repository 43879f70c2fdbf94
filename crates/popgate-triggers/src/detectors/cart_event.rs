//! Cart lifecycle triggers: `add_to_cart`, `cart_drawer_open`, `cart_value`.
//!
//! Themes announce cart changes with differently named custom events, so each
//! lifecycle event is recognized under several aliases.

use std::sync::Arc;
use std::time::Duration;

use popgate_core::ids::id_from_value;
use popgate_core::{PageContext, PageSignal, TriggerContext};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use super::parse_config;
use crate::detector::{Detector, DetectorCore, DetectorEnv, ResolveCallback, Resolver};
use crate::errors::{Result, TriggerError};
use crate::filter::ProductFilter;

/// Custom event names announcing an item added to the cart.
pub const ADD_TO_CART_EVENTS: &[&str] = &[
    "add_to_cart",
    "cart:add",
    "cart:item-added",
    "product:added-to-cart",
    "ajaxProduct:added",
];

/// Custom event names announcing the cart drawer opened.
pub const CART_DRAWER_OPEN_EVENTS: &[&str] = &[
    "cart_drawer_open",
    "cart:open",
    "cart-drawer:open",
    "drawer:open",
];

/// Custom event names announcing new cart contents.
pub const CART_UPDATE_EVENTS: &[&str] = &["cart_update", "cart:updated", "cart:change", "cart:refresh"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CartValueConfig {
    min_value: Option<f64>,
    max_value: Option<f64>,
    check_interval: Option<u64>,
}

/// Inclusive cart-total range; a missing bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ValueRange {
    /// Lower bound.
    pub min: Option<f64>,
    /// Upper bound.
    pub max: Option<f64>,
}

impl ValueRange {
    /// Whether `total` lies in the range.
    #[must_use]
    pub fn contains(&self, total: f64) -> bool {
        self.min.is_none_or(|min| total >= min) && self.max.is_none_or(|max| total <= max)
    }
}

#[derive(Debug)]
enum CartTrigger {
    AddToCart(ProductFilter),
    DrawerOpen,
    Value {
        range: ValueRange,
        poll: Option<Duration>,
    },
}

/// Listens for cart lifecycle events.
#[derive(Debug)]
pub struct CartEventDetector {
    core: DetectorCore,
    env: DetectorEnv,
    trigger: CartTrigger,
}

impl CartEventDetector {
    /// Build for one of `add_to_cart`, `cart_drawer_open` or `cart_value`.
    pub fn from_config(trigger_type: &str, config: &Value, env: &DetectorEnv) -> Result<Self> {
        let trigger = match trigger_type {
            "add_to_cart" => CartTrigger::AddToCart(parse_config(trigger_type, config)?),
            "cart_drawer_open" => CartTrigger::DrawerOpen,
            "cart_value" => {
                let cfg: CartValueConfig = parse_config(trigger_type, config)?;
                if let (Some(min), Some(max)) = (cfg.min_value, cfg.max_value) {
                    if min > max {
                        return Err(TriggerError::invalid(
                            trigger_type,
                            format!("min_value {min} exceeds max_value {max}"),
                        ));
                    }
                }
                CartTrigger::Value {
                    range: ValueRange {
                        min: cfg.min_value,
                        max: cfg.max_value,
                    },
                    poll: cfg
                        .check_interval
                        .filter(|ms| *ms > 0)
                        .map(Duration::from_millis),
                }
            }
            other => return Err(TriggerError::UnknownTrigger(other.to_string())),
        };
        Ok(Self {
            core: DetectorCore::new(trigger_type),
            env: env.clone(),
            trigger,
        })
    }

    fn start_add_to_cart(&self, resolver: Resolver, filter: ProductFilter) {
        let mut rx = self.env.bus.subscribe();
        let page = Arc::clone(&self.env.page);
        self.core.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(PageSignal::Custom { name, detail }) if is_alias(ADD_TO_CART_EVENTS, &name) => {
                        let product_id = product_id_from_detail(&detail);
                        let mut collections = page.collection_ids();
                        collections.extend(collection_ids_from_detail(&detail));
                        if !filter.matches(product_id.as_deref(), &collections) {
                            debug!(?product_id, "add to cart did not match filter");
                            continue;
                        }
                        let mut context =
                            TriggerContext::for_type(resolver.trigger_type()).with_detail(detail);
                        if let Some(id) = product_id {
                            context = context.with_product(id);
                        }
                        let _ = resolver.trigger(context);
                        return;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => debug!(skipped, "cart listener lagged"),
                    Err(RecvError::Closed) => {
                        let _ = resolver.unmet("signal bus closed");
                        return;
                    }
                }
            }
        });
    }

    fn start_drawer_open(&self, resolver: Resolver) {
        let mut rx = self.env.bus.subscribe();
        self.core.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(PageSignal::Custom { name, detail })
                        if is_alias(CART_DRAWER_OPEN_EVENTS, &name) =>
                    {
                        let context =
                            TriggerContext::for_type(resolver.trigger_type()).with_detail(detail);
                        let _ = resolver.trigger(context);
                        return;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => debug!(skipped, "cart listener lagged"),
                    Err(RecvError::Closed) => {
                        let _ = resolver.unmet("signal bus closed");
                        return;
                    }
                }
            }
        });
    }

    fn start_value(&self, resolver: Resolver, range: ValueRange, poll: Option<Duration>) {
        let mut rx = self.env.bus.subscribe();
        if let Some(total) = self.env.page.cart().map(|c| c.total) {
            if range.contains(total) {
                let _ = resolver.trigger(value_context(resolver.trigger_type(), total));
                return;
            }
        }

        let page = Arc::clone(&self.env.page);
        self.core.spawn(async move {
            // Without polling the interval is parked far in the future.
            let period = poll.unwrap_or(Duration::from_secs(86_400));
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                let total = tokio::select! {
                    recv = rx.recv() => match recv {
                        Ok(PageSignal::Custom { name, detail }) if is_alias(CART_UPDATE_EVENTS, &name) => {
                            cart_total_from_detail(&detail)
                        }
                        Ok(_) => None,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "cart listener lagged");
                            current_total(page.as_ref())
                        }
                        Err(RecvError::Closed) => {
                            let _ = resolver.unmet("signal bus closed");
                            return;
                        }
                    },
                    _ = ticker.tick(), if poll.is_some() => current_total(page.as_ref()),
                };
                if let Some(total) = total {
                    if range.contains(total) {
                        let _ = resolver.trigger(value_context(resolver.trigger_type(), total));
                        return;
                    }
                    debug!(total, "cart value outside range");
                }
            }
        });
    }
}

impl Detector for CartEventDetector {
    fn trigger_type(&self) -> &str {
        self.core.trigger_type()
    }

    fn start(&self, on_resolved: ResolveCallback) {
        if !self.core.arm(on_resolved) {
            return;
        }
        let resolver = self.core.resolver();
        match &self.trigger {
            CartTrigger::AddToCart(filter) => self.start_add_to_cart(resolver, filter.clone()),
            CartTrigger::DrawerOpen => self.start_drawer_open(resolver),
            CartTrigger::Value { range, poll } => self.start_value(resolver, *range, *poll),
        }
    }

    fn stop(&self) {
        self.core.stop();
    }

    fn is_active(&self) -> bool {
        self.core.is_active()
    }
}

fn is_alias(aliases: &[&str], name: &str) -> bool {
    aliases.contains(&name)
}

fn value_context(trigger_type: &str, total: f64) -> TriggerContext {
    TriggerContext::for_type(trigger_type).with_detail(json!({ "cartTotal": total }))
}

fn current_total(page: &dyn PageContext) -> Option<f64> {
    page.cart().map(|c| c.total)
}

/// Product id from an add-to-cart detail: `productId`, `product_id`,
/// `product.id`, `variant.product_id` or `id`.
fn product_id_from_detail(detail: &Value) -> Option<String> {
    ["productId", "product_id"]
        .iter()
        .find_map(|key| detail.get(*key).and_then(id_from_value))
        .or_else(|| detail.pointer("/product/id").and_then(id_from_value))
        .or_else(|| detail.pointer("/variant/product_id").and_then(id_from_value))
        .or_else(|| detail.get("id").and_then(id_from_value))
}

fn collection_ids_from_detail(detail: &Value) -> Vec<String> {
    ["collectionIds", "collection_ids"]
        .iter()
        .find_map(|key| detail.get(*key).and_then(Value::as_array))
        .or_else(|| detail.pointer("/product/collection_ids").and_then(Value::as_array))
        .map(|ids| ids.iter().filter_map(id_from_value).collect())
        .unwrap_or_default()
}

/// Cart total from an update detail, either the cart itself or `{ cart }`.
fn cart_total_from_detail(detail: &Value) -> Option<f64> {
    let cart = detail.get("cart").unwrap_or(detail);
    ["total", "totalPrice", "total_price"]
        .iter()
        .find_map(|key| cart.get(*key).and_then(Value::as_f64))
}
