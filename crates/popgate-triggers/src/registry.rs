//! Trigger-type → detector factory map.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::detector::{Detector, DetectorEnv};
use crate::detectors::{
    CartEventDetector, CustomEventDetector, ExitIntentDetector, IdleTimerDetector,
    ProductViewDetector, ScrollDepthDetector, TimeDelayDetector,
};
use crate::errors::{Result, TriggerError};

/// Builds a detector for `(trigger_type, config)` in an environment.
pub type DetectorFactory =
    Arc<dyn Fn(&str, &Value, &DetectorEnv) -> Result<Box<dyn Detector>> + Send + Sync>;

/// Trigger types understood by [`DetectorRegistry::with_defaults`].
pub const BUILTIN_TRIGGER_TYPES: &[&str] = &[
    "add_to_cart",
    "cart_drawer_open",
    "cart_value",
    "custom_event",
    "exit_intent",
    "idle_timer",
    "page_load",
    "product_view",
    "scroll_depth",
    "time_delay",
];

/// Detector factories keyed by trigger-type name.
#[derive(Default)]
pub struct DetectorRegistry {
    factories: HashMap<String, DetectorFactory>,
}

impl DetectorRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in detector.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for trigger_type in ["page_load", "time_delay"] {
            registry.register(
                trigger_type,
                |ty, cfg, _env| Ok(Box::new(TimeDelayDetector::from_config(ty, cfg)?)),
            );
        }
        registry.register(
            "exit_intent",
            |ty, cfg, env| Ok(Box::new(ExitIntentDetector::from_config(ty, cfg, env)?)),
        );
        registry.register(
            "scroll_depth",
            |ty, cfg, env| Ok(Box::new(ScrollDepthDetector::from_config(ty, cfg, env)?)),
        );
        registry.register(
            "idle_timer",
            |ty, cfg, env| Ok(Box::new(IdleTimerDetector::from_config(ty, cfg, env)?)),
        );
        for trigger_type in ["add_to_cart", "cart_drawer_open", "cart_value"] {
            registry.register(
                trigger_type,
                |ty, cfg, env| Ok(Box::new(CartEventDetector::from_config(ty, cfg, env)?)),
            );
        }
        registry.register(
            "custom_event",
            |ty, cfg, env| Ok(Box::new(CustomEventDetector::from_config(ty, cfg, env)?)),
        );
        registry.register(
            "product_view",
            |ty, cfg, env| Ok(Box::new(ProductViewDetector::from_config(ty, cfg, env)?)),
        );
        registry
    }

    /// Register (or replace) the factory for `trigger_type`.
    pub fn register<F>(&mut self, trigger_type: impl Into<String>, build: F)
    where
        F: Fn(&str, &Value, &DetectorEnv) -> Result<Box<dyn Detector>> + Send + Sync + 'static,
    {
        let trigger_type = trigger_type.into();
        debug!(trigger_type = %trigger_type, "registering detector factory");
        let factory: DetectorFactory = Arc::new(build);
        let _ = self.factories.insert(trigger_type, factory);
    }

    /// Whether a factory exists for `trigger_type`.
    #[must_use]
    pub fn contains(&self, trigger_type: &str) -> bool {
        self.factories.contains_key(trigger_type)
    }

    /// Registered trigger types, sorted.
    #[must_use]
    pub fn trigger_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Build an unstarted detector.
    pub fn build(
        &self,
        trigger_type: &str,
        config: &Value,
        env: &DetectorEnv,
    ) -> Result<Box<dyn Detector>> {
        let factory = self
            .factories
            .get(trigger_type)
            .ok_or_else(|| TriggerError::UnknownTrigger(trigger_type.to_string()))?;
        factory(trigger_type, config, env)
    }
}

impl std::fmt::Debug for DetectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorRegistry")
            .field("trigger_types", &self.trigger_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use popgate_core::{PageState, SignalBus};
    use popgate_settings::TriggerSettings;
    use serde_json::json;

    fn env() -> DetectorEnv {
        DetectorEnv::new(
            SignalBus::default(),
            Arc::new(PageState::new()),
            TriggerSettings::default(),
        )
    }

    #[test]
    fn defaults_cover_builtin_types() {
        let registry = DetectorRegistry::with_defaults();
        assert_eq!(registry.trigger_types(), BUILTIN_TRIGGER_TYPES);
    }

    #[test]
    fn build_sets_trigger_type() {
        let registry = DetectorRegistry::with_defaults();
        let det = registry
            .build("cart_drawer_open", &json!({"enabled": true}), &env())
            .unwrap();
        assert_eq!(det.trigger_type(), "cart_drawer_open");
        assert!(!det.is_active());
    }

    #[test]
    fn unknown_type_is_error() {
        let registry = DetectorRegistry::with_defaults();
        let result = registry.build("hover", &json!({}), &env());
        assert_matches!(result, Err(TriggerError::UnknownTrigger(name)) if name == "hover");
    }

    #[test]
    fn bad_config_is_error() {
        let registry = DetectorRegistry::with_defaults();
        let result = registry.build("custom_event", &json!({"enabled": true}), &env());
        assert_matches!(result, Err(TriggerError::InvalidConfig { .. }));
    }

    #[test]
    fn register_replaces_factory() {
        let mut registry = DetectorRegistry::new();
        registry.register(
            "custom",
            |_, _, _| Err(TriggerError::invalid("custom", "first")),
        );
        registry.register(
            "custom",
            |ty, cfg, _| Ok(Box::new(TimeDelayDetector::from_config(ty, cfg)?)),
        );
        assert!(registry.build("custom", &json!({}), &env()).is_ok());
        assert_eq!(registry.trigger_types(), vec!["custom"]);
    }
}
