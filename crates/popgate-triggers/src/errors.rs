//! Trigger error types.

use thiserror::Error;

/// Errors raised while building a detector.
///
/// These never escape trigger evaluation: the combinator logs them and
/// treats the affected trigger type as `false`.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// No detector factory is registered for the trigger type.
    #[error("unknown trigger type: {0}")]
    UnknownTrigger(String),
    /// The per-type configuration object could not be used.
    #[error("invalid {trigger_type} config: {message}")]
    InvalidConfig {
        /// Trigger type whose configuration is invalid.
        trigger_type: String,
        /// What is wrong with it.
        message: String,
    },
}

impl TriggerError {
    /// Shorthand for [`TriggerError::InvalidConfig`].
    pub fn invalid(trigger_type: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::InvalidConfig {
            trigger_type: trigger_type.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for trigger operations.
pub type Result<T> = std::result::Result<T, TriggerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_trigger_display() {
        let err = TriggerError::UnknownTrigger("hover_intent".into());
        assert_eq!(err.to_string(), "unknown trigger type: hover_intent");
    }

    #[test]
    fn invalid_config_display() {
        let err = TriggerError::invalid("custom_event", "event_name is required");
        assert_eq!(
            err.to_string(),
            "invalid custom_event config: event_name is required"
        );
    }
}
