//! # popgate-settings
//!
//! Layered configuration for the trigger and hook engines.
//!
//! Settings come from compiled defaults, then `~/.popgate/settings.json`
//! (deep-merged), then `POPGATE_*` environment variables.
//!
//! ```no_run
//! use popgate_settings::get_settings;
//!
//! let settings = get_settings();
//! println!("cache ttl: {:?}", settings.hooks.cache_ttl());
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<GateSettings> = OnceLock::new();

/// Process-wide settings, loaded on first access.
///
/// Falls back to compiled defaults (with a warning) if loading fails.
pub fn get_settings() -> &'static GateSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to load settings, using defaults");
            GateSettings::default()
        })
    })
}

/// Install `settings` as the process-wide value.
///
/// # Errors
///
/// Hands `settings` back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: GateSettings) -> std::result::Result<(), GateSettings> {
    SETTINGS.set(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_reachable() {
        let _settings = GateSettings::default();
        let _path = settings_path();
        let merged = deep_merge(serde_json::json!({"x": 1}), serde_json::json!({"y": 2}));
        assert_eq!(merged["x"], 1);
        assert_eq!(merged["y"], 2);
    }

    #[test]
    fn get_settings_is_stable() {
        let a = get_settings();
        let b = get_settings();
        assert!(std::ptr::eq(a, b));
        assert!(init_settings(GateSettings::default()).is_err());
    }
}
