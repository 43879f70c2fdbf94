//! Detector defaults.
//!
//! Per-campaign trigger configuration overrides these; they apply when a
//! campaign leaves a field out.

use std::time::Duration;

use popgate_core::ActivityKind;
use serde::{Deserialize, Serialize};

/// Defaults shared by every campaign's detectors.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggerSettings {
    /// Minimum time after arming before exit intent may fire.
    pub exit_intent_delay_ms: u64,
    /// Whether exit intent runs on mobile user agents.
    pub exit_intent_allow_mobile: bool,
    /// Case-insensitive user-agent substrings that identify mobile devices.
    pub mobile_user_agent_markers: Vec<String>,
    /// Scroll signal debounce window.
    pub scroll_debounce_ms: u64,
    /// Scroll depth used when a campaign omits `depth_percentage`.
    pub default_scroll_depth_percent: f64,
    /// Idle duration used when a campaign omits `idle_duration`.
    pub default_idle_duration_ms: u64,
    /// Activity kinds that reset idle timers when a campaign omits `events`.
    pub idle_activity_events: Vec<ActivityKind>,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            exit_intent_delay_ms: 1000,
            exit_intent_allow_mobile: false,
            mobile_user_agent_markers: [
                "android",
                "iphone",
                "ipad",
                "ipod",
                "mobile",
                "blackberry",
                "iemobile",
                "opera mini",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            scroll_debounce_ms: 100,
            default_scroll_depth_percent: 50.0,
            default_idle_duration_ms: 30_000,
            idle_activity_events: ActivityKind::all().to_vec(),
        }
    }
}

impl TriggerSettings {
    /// Whether `user_agent` looks like a mobile browser.
    #[must_use]
    pub fn is_mobile_user_agent(&self, user_agent: &str) -> bool {
        let ua = user_agent.to_ascii_lowercase();
        self.mobile_user_agent_markers
            .iter()
            .any(|marker| ua.contains(&marker.to_ascii_lowercase()))
    }

    /// Scroll debounce as a [`Duration`].
    #[must_use]
    pub fn scroll_debounce(&self) -> Duration {
        Duration::from_millis(self.scroll_debounce_ms)
    }
}
