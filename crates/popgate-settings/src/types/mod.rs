//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`: the settings
//! file may be partial and missing fields keep their compiled default.

mod hooks;
mod triggers;

pub use hooks::*;
pub use triggers::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "hooks": { "cacheTtlMs": 60000 },
///   "triggers": { "scrollDebounceMs": 50 }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GateSettings {
    /// Settings schema version.
    pub version: String,
    /// Detector defaults.
    pub triggers: TriggerSettings,
    /// Hook executor and cache settings.
    pub hooks: HookSettings,
    /// Signal bus settings.
    pub signals: SignalSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            triggers: TriggerSettings::default(),
            hooks: HookSettings::default(),
            signals: SignalSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl GateSettings {
    /// Reject values that would make the engines misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.hooks.cache_ttl_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "hooks.cacheTtlMs must be greater than 0".to_string(),
            ));
        }
        if self.hooks.default_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "hooks.defaultTimeoutMs must be greater than 0".to_string(),
            ));
        }
        if self.signals.capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "signals.capacity must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.triggers.default_scroll_depth_percent) {
            return Err(SettingsError::InvalidValue(
                "triggers.defaultScrollDepthPercent must be within 0..=100".to_string(),
            ));
        }
        Ok(())
    }
}

/// Signal bus settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignalSettings {
    /// Per-subscriber buffer; slower detectors skip older signals.
    pub capacity: usize,
}

impl Default for SignalSettings {
    fn default() -> Self {
        Self {
            capacity: popgate_core::signals::DEFAULT_SIGNAL_CAPACITY,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit one JSON object per line instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}
