//! `scroll_depth`: visitor scrolled past a percentage of the page.

use std::time::Duration;

use popgate_core::{PageSignal, ScrollMetrics, TriggerContext};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::debug;

use super::parse_config;
use crate::detector::{Detector, DetectorCore, DetectorEnv, ResolveCallback};
use crate::errors::{Result, TriggerError};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScrollDepthConfig {
    depth_percentage: Option<f64>,
    debounce: Option<u64>,
}

/// Fires once scroll depth reaches the configured percentage.
///
/// Checks the current position on start, then re-checks after each burst of
/// scroll signals settles for the debounce window.
#[derive(Debug)]
pub struct ScrollDepthDetector {
    core: DetectorCore,
    env: DetectorEnv,
    target: f64,
    debounce: Duration,
}

impl ScrollDepthDetector {
    /// Build from `{ depth_percentage, debounce }`.
    pub fn from_config(trigger_type: &str, config: &Value, env: &DetectorEnv) -> Result<Self> {
        let cfg: ScrollDepthConfig = parse_config(trigger_type, config)?;
        let target = cfg
            .depth_percentage
            .unwrap_or(env.settings.default_scroll_depth_percent);
        if !(0.0..=100.0).contains(&target) {
            return Err(TriggerError::invalid(
                trigger_type,
                format!("depth_percentage {target} is outside 0..=100"),
            ));
        }
        Ok(Self {
            core: DetectorCore::new(trigger_type),
            env: env.clone(),
            target,
            debounce: cfg
                .debounce
                .map_or_else(|| env.settings.scroll_debounce(), Duration::from_millis),
        })
    }

    fn context(trigger_type: &str, metrics: &ScrollMetrics) -> TriggerContext {
        TriggerContext::for_type(trigger_type)
            .with_detail(json!({ "depthPercent": metrics.depth_percent() }))
    }
}

impl Detector for ScrollDepthDetector {
    fn trigger_type(&self) -> &str {
        self.core.trigger_type()
    }

    fn start(&self, on_resolved: ResolveCallback) {
        if !self.core.arm(on_resolved) {
            return;
        }
        let resolver = self.core.resolver();
        let mut rx = self.env.bus.subscribe();

        let current = self.env.page.scroll_metrics();
        if current.depth_percent() >= self.target {
            let _ = resolver.trigger(Self::context(self.core.trigger_type(), &current));
            return;
        }

        let target = self.target;
        let debounce = self.debounce;
        let trigger_type = self.core.trigger_type().to_string();
        self.core.spawn(async move {
            let settle = tokio::time::sleep(debounce);
            tokio::pin!(settle);
            let mut pending: Option<ScrollMetrics> = None;
            loop {
                tokio::select! {
                    recv = rx.recv() => match recv {
                        Ok(PageSignal::Scroll(metrics)) => {
                            pending = Some(metrics);
                            settle.as_mut().reset(Instant::now() + debounce);
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "scroll tracker lagged behind signals");
                        }
                        Err(RecvError::Closed) => {
                            let _ = resolver.unmet("signal bus closed");
                            return;
                        }
                    },
                    () = &mut settle, if pending.is_some() => {
                        if let Some(metrics) = pending.take() {
                            let depth = metrics.depth_percent();
                            if depth >= target {
                                let _ = resolver.trigger(Self::context(&trigger_type, &metrics));
                                return;
                            }
                            debug!(depth, target, "scroll depth below target");
                        }
                    }
                }
            }
        });
    }

    fn stop(&self) {
        self.core.stop();
    }

    fn is_active(&self) -> bool {
        self.core.is_active()
    }
}
