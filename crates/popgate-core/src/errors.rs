//! API client error types.

use thiserror::Error;

/// Errors surfaced by an [`ApiClient`](crate::api::ApiClient) implementation.
///
/// The core never retries; retry policy belongs to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be sent or the connection failed.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The response body was not the expected JSON shape.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type for API client calls.
pub type Result<T> = std::result::Result<T, ApiError>;
