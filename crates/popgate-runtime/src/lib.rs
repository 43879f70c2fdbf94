//! # popgate-runtime
//!
//! The [`CampaignGate`] that decides whether a campaign popup renders:
//! trigger evaluation first, then resource hooks, with cancellation,
//! popup-close and navigation handling.

#![deny(unsafe_code)]

pub mod gate;

pub use gate::{CampaignGate, GateOutcome};

use popgate_settings::LoggingSettings;

/// Install the global subscriber described by `settings`.
pub fn init_logging(settings: &LoggingSettings) {
    if settings.json {
        popgate_core::logging::init_json_subscriber(&settings.level);
    } else {
        popgate_core::logging::init_subscriber(&settings.level);
    }
}
