//! Completion backend errors.

use thiserror::Error;

/// Result alias for backend operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors surfaced by a completion backend.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level failure talking to the service.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the service.
    #[error("api error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Body text or parsed error message.
        message: String,
    },

    /// Malformed JSON in a stream chunk or response body.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// SSE framing failure mid-stream.
    #[error("stream error: {0}")]
    Stream(String),

    /// The response carried no usable content.
    #[error("empty completion response")]
    EmptyResponse,
}
