//! Hook error types.

use popgate_core::ApiError;
use thiserror::Error;

/// Errors a resource hook can end with.
///
/// The executor turns every one of these into a failed
/// [`HookResult`](crate::types::HookResult); none propagate further.
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook did not finish within its timeout.
    #[error("Hook '{name}' timed out after {timeout_ms}ms")]
    Timeout {
        /// Hook name.
        name: String,
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// An API call made by the hook failed.
    #[error("Hook '{name}' API call failed: {source}")]
    Api {
        /// Hook name.
        name: String,
        /// Underlying client error.
        #[source]
        source: ApiError,
    },

    /// The hook reported a failure of its own.
    #[error("Hook '{name}' failed: {message}")]
    Execution {
        /// Hook name.
        name: String,
        /// What went wrong.
        message: String,
    },

    /// The hook's task panicked or was cancelled.
    #[error("Hook '{name}' aborted: {message}")]
    Aborted {
        /// Hook name.
        name: String,
        /// Panic or cancellation description.
        message: String,
    },
}

impl HookError {
    /// Wrap an API error raised by hook `name`.
    pub fn api(name: impl Into<String>, source: ApiError) -> Self {
        Self::Api {
            name: name.into(),
            source,
        }
    }

    /// Failure reported by hook `name`.
    pub fn execution(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Whether this is a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type for hook operations.
pub type Result<T> = std::result::Result<T, HookError>;
