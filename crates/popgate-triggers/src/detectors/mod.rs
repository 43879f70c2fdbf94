//! Built-in detectors, one module per behavioral condition.

pub mod cart_event;
pub mod custom_event;
pub mod exit_intent;
pub mod idle_timer;
pub mod product_view;
pub mod scroll_depth;
pub mod time_delay;

pub use cart_event::CartEventDetector;
pub use custom_event::CustomEventDetector;
pub use exit_intent::ExitIntentDetector;
pub use idle_timer::IdleTimerDetector;
pub use product_view::ProductViewDetector;
pub use scroll_depth::ScrollDepthDetector;
pub use time_delay::TimeDelayDetector;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::{Result, TriggerError};

/// Parse a per-type configuration object into a detector's typed config.
pub(crate) fn parse_config<T: DeserializeOwned>(trigger_type: &str, config: &Value) -> Result<T> {
    T::deserialize(config).map_err(|e| TriggerError::invalid(trigger_type, e))
}
