//! `exit_intent`: cursor leaving through the top of the viewport, fast.

use std::collections::VecDeque;
use std::time::Duration;

use popgate_core::{PageSignal, TriggerContext};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::debug;

use super::parse_config;
use crate::detector::{Detector, DetectorCore, DetectorEnv, ResolveCallback};
use crate::errors::Result;

/// Mouse positions kept for the velocity estimate.
const TRACKED_POSITIONS: usize = 5;

/// How eagerly exit intent fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    /// Narrow band, fast movement.
    Low,
    /// The default.
    #[default]
    Medium,
    /// Wide band, slow movement.
    High,
}

impl Sensitivity {
    /// Distance from the top edge (px) within which a leave counts.
    #[must_use]
    pub fn band_px(self) -> f64 {
        match self {
            Self::Low => 5.0,
            Self::Medium => 15.0,
            Self::High => 30.0,
        }
    }

    /// Minimum upward speed (px/ms) over the tracked positions.
    #[must_use]
    pub fn min_velocity(self) -> f64 {
        match self {
            Self::Low => 0.5,
            Self::Medium => 0.2,
            Self::High => 0.05,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExitIntentConfig {
    sensitivity: Sensitivity,
    delay: Option<u64>,
    allow_mobile: Option<bool>,
}

#[derive(Debug, Clone, Copy)]
struct Position {
    y: f64,
    t: f64,
}

/// Upward speed in px/ms from the oldest to the newest tracked position.
///
/// Positive means moving up. `None` without two positions spread in time.
fn upward_velocity(positions: &VecDeque<Position>) -> Option<f64> {
    let first = positions.front()?;
    let last = positions.back()?;
    let dt = last.t - first.t;
    if dt <= 0.0 {
        return None;
    }
    Some((first.y - last.y) / dt)
}

/// Fires when the cursor leaves near the top edge while moving up.
#[derive(Debug)]
pub struct ExitIntentDetector {
    core: DetectorCore,
    env: DetectorEnv,
    sensitivity: Sensitivity,
    delay: Duration,
    allow_mobile: bool,
}

impl ExitIntentDetector {
    /// Build from `{ sensitivity, delay, allow_mobile }`.
    pub fn from_config(trigger_type: &str, config: &Value, env: &DetectorEnv) -> Result<Self> {
        let cfg: ExitIntentConfig = parse_config(trigger_type, config)?;
        Ok(Self {
            core: DetectorCore::new(trigger_type),
            sensitivity: cfg.sensitivity,
            delay: Duration::from_millis(cfg.delay.unwrap_or(env.settings.exit_intent_delay_ms)),
            allow_mobile: cfg
                .allow_mobile
                .unwrap_or(env.settings.exit_intent_allow_mobile),
            env: env.clone(),
        })
    }
}

impl Detector for ExitIntentDetector {
    fn trigger_type(&self) -> &str {
        self.core.trigger_type()
    }

    fn start(&self, on_resolved: ResolveCallback) {
        if !self.core.arm(on_resolved) {
            return;
        }
        let resolver = self.core.resolver();
        if !self.allow_mobile
            && self
                .env
                .settings
                .is_mobile_user_agent(&self.env.page.user_agent())
        {
            let _ = resolver.unmet("exit intent is disabled on mobile devices");
            return;
        }

        let mut rx = self.env.bus.subscribe();
        let armed_at = Instant::now();
        let sensitivity = self.sensitivity;
        let delay = self.delay;
        let trigger_type = self.core.trigger_type().to_string();
        self.core.spawn(async move {
            let mut positions: VecDeque<Position> = VecDeque::with_capacity(TRACKED_POSITIONS);
            loop {
                match rx.recv().await {
                    Ok(PageSignal::MouseMove { y, timestamp_ms, .. }) => {
                        if positions.len() == TRACKED_POSITIONS {
                            let _ = positions.pop_front();
                        }
                        positions.push_back(Position { y, t: timestamp_ms });
                    }
                    Ok(PageSignal::MouseLeave { y, .. }) => {
                        if armed_at.elapsed() < delay || y > sensitivity.band_px() {
                            continue;
                        }
                        let Some(velocity) = upward_velocity(&positions) else {
                            continue;
                        };
                        if velocity < sensitivity.min_velocity() {
                            debug!(velocity, "exit leave too slow");
                            continue;
                        }
                        let context = TriggerContext::for_type(trigger_type)
                            .with_detail(json!({ "y": y, "velocity": velocity }));
                        let _ = resolver.trigger(context);
                        return;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "exit intent lagged behind signals");
                        positions.clear();
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
    use std::sync::Arc;

    const DESKTOP_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0) AppleWebKit/605.1.15";

    fn env_with_ua(ua: &str) -> DetectorEnv {
        let page = PageState::new();
        page.set_user_agent(ua);
        DetectorEnv::new(SignalBus::default(), Arc::new(page), TriggerSettings::default())
    }

    fn recorder() -> (Arc<Mutex<Vec<Detection>>>, ResolveCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        (seen, Box::new(move |d| seen2.lock().push(d)))
    }

    fn mouse_move(y: f64, t: f64) -> PageSignal {
        PageSignal::MouseMove {
            x: 100.0,
            y,
            timestamp_ms: t,
        }
    }

    async fn flush() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    /// Upward sweep ending near the top edge at `speed` px/ms.
    fn sweep(bus: &SignalBus, speed: f64) {
        for i in 0..5 {
            let t = f64::from(i) * 10.0;
            let _ = bus.emit(mouse_move(100.0 - speed * t, t));
        }
    }

    #[test]
    fn sensitivity_bands() {
        assert!((Sensitivity::Low.band_px() - 5.0).abs() < f64::EPSILON);
        assert!((Sensitivity::High.min_velocity() - 0.05).abs() < f64::EPSILON);
        assert_eq!(Sensitivity::default(), Sensitivity::Medium);
    }

    #[test]
    fn velocity_needs_two_spread_positions() {
        let mut positions = VecDeque::new();
        assert_eq!(upward_velocity(&positions), None);
        positions.push_back(Position { y: 50.0, t: 0.0 });
        assert_eq!(upward_velocity(&positions), None);
        positions.push_back(Position { y: 10.0, t: 20.0 });
        assert_eq!(upward_velocity(&positions), Some(2.0));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_upward_leave_fires_after_delay() {
        let env = env_with_ua(DESKTOP_UA);
        let det = ExitIntentDetector::from_config(
            "exit_intent",
            &json!({"enabled": true, "sensitivity": "medium"}),
            &env,
        )
        .unwrap();
        let (seen, cb) = recorder();
        det.start(cb);

        tokio::time::sleep(Duration::from_millis(1001)).await;
        sweep(&env.bus, 2.0);
        let _ = env.bus.emit(PageSignal::MouseLeave { x: 100.0, y: 3.0 });
        flush().await;

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn leave_before_delay_is_ignored() {
        let env = env_with_ua(DESKTOP_UA);
        let det = ExitIntentDetector::from_config("exit_intent", &json!({"enabled": true}), &env)
            .unwrap();
        let (seen, cb) = recorder();
        det.start(cb);

        tokio::time::sleep(Duration::from_millis(500)).await;
        sweep(&env.bus, 2.0);
        let _ = env.bus.emit(PageSignal::MouseLeave { x: 100.0, y: 3.0 });
        flush().await;

        assert!(seen.lock().is_empty());
        assert!(det.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn delay_counts_from_start_not_first_poll() {
        let env = env_with_ua(DESKTOP_UA);
        let det = ExitIntentDetector::from_config(
            "exit_intent",
            &json!({"enabled": true, "delay": 1000}),
            &env,
        )
        .unwrap();
        let (seen, cb) = recorder();
        det.start(cb);

        // The clock moves before the detector task first runs.
        tokio::time::advance(Duration::from_millis(1200)).await;
        sweep(&env.bus, 2.0);
        let _ = env.bus.emit(PageSignal::MouseLeave { x: 100.0, y: 3.0 });
        flush().await;

        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn leave_below_band_is_ignored() {
        let env = env_with_ua(DESKTOP_UA);
        let det = ExitIntentDetector::from_config(
            "exit_intent",
            &json!({"enabled": true, "sensitivity": "low", "delay": 0}),
            &env,
        )
        .unwrap();
        let (seen, cb) = recorder();
        det.start(cb);
        flush().await;

        sweep(&env.bus, 2.0);
        let _ = env.bus.emit(PageSignal::MouseLeave { x: 100.0, y: 12.0 });
        flush().await;
        assert!(seen.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_leave_is_ignored() {
        let env = env_with_ua(DESKTOP_UA);
        let det = ExitIntentDetector::from_config(
            "exit_intent",
            &json!({"enabled": true, "sensitivity": "medium", "delay": 0}),
            &env,
        )
        .unwrap();
        let (seen, cb) = recorder();
        det.start(cb);
        flush().await;

        sweep(&env.bus, 0.1);
        let _ = env.bus.emit(PageSignal::MouseLeave { x: 100.0, y: 2.0 });
        flush().await;
        assert!(seen.lock().is_empty());

        // A later fast exit still fires.
        sweep(&env.bus, 1.0);
        let _ = env.bus.emit(PageSignal::MouseLeave { x: 100.0, y: 2.0 });
        flush().await;
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn mobile_resolves_unmet() {
        let env = env_with_ua("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile");
        let det = ExitIntentDetector::from_config("exit_intent", &json!({"enabled": true}), &env)
            .unwrap();
        let (seen, cb) = recorder();
        det.start(cb);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], Detection::Unmet(_)));
        assert_eq!(env.bus.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn mobile_allowed_when_configured() {
        let env = env_with_ua("Mozilla/5.0 (Linux; Android 14)");
        let det = ExitIntentDetector::from_config(
            "exit_intent",
            &json!({"enabled": true, "allow_mobile": true, "delay": 0}),
            &env,
        )
        .unwrap();
        let (seen, cb) = recorder();
        det.start(cb);
        assert!(seen.lock().is_empty());
        assert!(det.is_active());
    }

    #[test]
    fn unknown_sensitivity_is_invalid() {
        let env = env_with_ua(DESKTOP_UA);
        assert!(
            ExitIntentDetector::from_config(
                "exit_intent",
                &json!({"sensitivity": "extreme"}),
                &env
            )
            .is_err()
        );
    }
}
