//! `custom_event`: first occurrence of a named theme/application event.

use popgate_core::{PageSignal, TriggerContext};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use super::parse_config;
use crate::detector::{Detector, DetectorCore, DetectorEnv, ResolveCallback};
use crate::errors::{Result, TriggerError};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CustomEventConfig {
    event_name: String,
}

/// Fires on the first custom event named `event_name`, carrying its detail.
#[derive(Debug)]
pub struct CustomEventDetector {
    core: DetectorCore,
    env: DetectorEnv,
    event_name: String,
}

impl CustomEventDetector {
    /// Build from `{ event_name }`.
    pub fn from_config(trigger_type: &str, config: &Value, env: &DetectorEnv) -> Result<Self> {
        let cfg: CustomEventConfig = parse_config(trigger_type, config)?;
        let event_name = cfg.event_name.trim().to_string();
        if event_name.is_empty() {
            return Err(TriggerError::invalid(trigger_type, "event_name is required"));
        }
        Ok(Self {
            core: DetectorCore::new(trigger_type),
            env: env.clone(),
            event_name,
        })
    }

    /// Event name this detector waits for.
    pub fn event_name(&self) -> &str {
        &self.event_name
    }
}

impl Detector for CustomEventDetector {
    fn trigger_type(&self) -> &str {
        self.core.trigger_type()
    }

    fn start(&self, on_resolved: ResolveCallback) {
        if !self.core.arm(on_resolved) {
            return;
        }
        let resolver = self.core.resolver();
        let mut rx = self.env.bus.subscribe();
        let event_name = self.event_name.clone();
        self.core.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(PageSignal::Custom { name, detail }) if name == event_name => {
                        let context =
                            TriggerContext::for_type(resolver.trigger_type()).with_detail(detail);
                        let _ = resolver.trigger(context);
                        return;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, event_name = %event_name, "custom event listener lagged");
                    }
                    Err(RecvError::Closed) => {
                        let _ = resolver.unmet("signal bus closed");
                        return;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Detection;
    use parking_lot::Mutex;
    use popgate_core::{PageState, SignalBus};
    use popgate_settings::TriggerSettings;
    use serde_json::json;
    use std::sync::Arc;

    fn env() -> DetectorEnv {
        DetectorEnv::new(
            SignalBus::default(),
            Arc::new(PageState::new()),
            TriggerSettings::default(),
        )
    }

    #[tokio::test]
    async fn fires_on_matching_event_with_detail() {
        let env = env();
        let det = CustomEventDetector::from_config(
            "custom_event",
            &json!({"enabled": true, "event_name": "quiz:completed"}),
            &env,
        )
        .unwrap();
        assert_eq!(det.event_name(), "quiz:completed");

        let (tx, rx) = tokio::sync::oneshot::channel();
        det.start(Box::new(move |d| {
            let _ = tx.send(d);
        }));

        let _ = env.bus.emit_custom("quiz:started", json!({}));
        let _ = env.bus.emit_custom("quiz:completed", json!({"score": 9}));

        let Detection::Triggered(ctx) = rx.await.unwrap() else {
            panic!("expected trigger");
        };
        assert_eq!(ctx.trigger_type.as_deref(), Some("custom_event"));
        assert_eq!(ctx.detail.unwrap()["score"], 9);
    }

    #[tokio::test]
    async fn other_events_do_not_fire() {
        let env = env();
        let det = CustomEventDetector::from_config(
            "custom_event",
            &json!({"enabled": true, "event_name": "quiz:completed"}),
            &env,
        )
        .unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        det.start(Box::new(move |d| seen2.lock().push(d)));

        let _ = env.bus.emit_custom("quiz:started", json!({}));
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert!(seen.lock().is_empty());
        assert!(det.is_active());
    }

    #[test]
    fn missing_event_name_is_invalid() {
        let err =
            CustomEventDetector::from_config("custom_event", &json!({"enabled": true}), &env())
                .unwrap_err();
        assert!(err.to_string().contains("event_name"));
    }
}
