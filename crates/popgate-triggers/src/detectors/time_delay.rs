//! `page_load` / `time_delay`: resolve after a fixed delay.

use std::time::Duration;

use popgate_core::TriggerContext;
use serde::Deserialize;
use serde_json::Value;

use super::parse_config;
use crate::detector::{Detector, DetectorCore, ResolveCallback};
use crate::errors::Result;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TimeDelayConfig {
    /// Milliseconds after start.
    delay: u64,
}

/// Fires `delay` ms after start; `0` fires inside `start`.
#[derive(Debug)]
pub struct TimeDelayDetector {
    core: DetectorCore,
    delay: Duration,
}

impl TimeDelayDetector {
    /// Build from a `{ "delay": <ms> }` configuration.
    pub fn from_config(trigger_type: &str, config: &Value) -> Result<Self> {
        let cfg: TimeDelayConfig = parse_config(trigger_type, config)?;
        Ok(Self::new(trigger_type, Duration::from_millis(cfg.delay)))
    }

    /// Detector that fires after `delay`.
    pub fn new(trigger_type: &str, delay: Duration) -> Self {
        Self {
            core: DetectorCore::new(trigger_type),
            delay,
        }
    }
}

impl Detector for TimeDelayDetector {
    fn trigger_type(&self) -> &str {
        self.core.trigger_type()
    }

    fn start(&self, on_resolved: ResolveCallback) {
        if !self.core.arm(on_resolved) {
            return;
        }
        let context = TriggerContext::for_type(self.core.trigger_type());
        if self.delay.is_zero() {
            let _ = self.core.resolver().trigger(context);
            return;
        }
        let resolver = self.core.resolver();
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
