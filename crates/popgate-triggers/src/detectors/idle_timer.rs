//! `idle_timer`: no visitor activity for a while.

use std::time::Duration;

use popgate_core::{ActivityKind, PageSignal, TriggerContext};
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
struct IdleTimerConfig {
    idle_duration: Option<u64>,
    events: Option<Vec<ActivityKind>>,
}

/// Fires once `idle_duration` passes without any configured activity.
#[derive(Debug)]
pub struct IdleTimerDetector {
    core: DetectorCore,
    env: DetectorEnv,
    idle: Duration,
    idle_ms: u64,
    events: Vec<ActivityKind>,
}

impl IdleTimerDetector {
    /// Build from `{ idle_duration, events }`.
    pub fn from_config(trigger_type: &str, config: &Value, env: &DetectorEnv) -> Result<Self> {
        let cfg: IdleTimerConfig = parse_config(trigger_type, config)?;
        let idle_ms = cfg
            .idle_duration
            .unwrap_or(env.settings.default_idle_duration_ms);
        if idle_ms == 0 {
            return Err(TriggerError::invalid(
                trigger_type,
                "idle_duration must be greater than 0",
            ));
        }
        Ok(Self {
            core: DetectorCore::new(trigger_type),
            env: env.clone(),
            idle: Duration::from_millis(idle_ms),
            idle_ms,
            events: cfg
                .events
                .unwrap_or_else(|| env.settings.idle_activity_events.clone()),
        })
    }
}

impl Detector for IdleTimerDetector {
    fn trigger_type(&self) -> &str {
        self.core.trigger_type()
    }

    fn start(&self, on_resolved: ResolveCallback) {
        if !self.core.arm(on_resolved) {
            return;
        }
        let resolver = self.core.resolver();
        let mut rx = self.env.bus.subscribe();
        let idle = self.idle;
        let events = self.events.clone();
        let context = TriggerContext::for_type(self.core.trigger_type())
            .with_detail(json!({ "idleMs": self.idle_ms }));
        let armed_at = Instant::now();

        self.core.spawn(async move {
            let deadline = tokio::time::sleep_until(armed_at + idle);
            tokio::pin!(deadline);
            let mut bus_open = true;
            loop {
                tokio::select! {
                    () = &mut deadline => {
                        let _ = resolver.trigger(context);
                        return;
                    }
                    recv = rx.recv(), if bus_open => match recv {
                        Ok(signal) => {
                            if signal.activity_kind().is_some_and(|k| events.contains(&k)) {
                                deadline.as_mut().reset(Instant::now() + idle);
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "idle timer lagged; counting as activity");
                            deadline.as_mut().reset(Instant::now() + idle);
                        }
                        Err(RecvError::Closed) => bus_open = false,
                    },
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
