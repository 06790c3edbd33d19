//! REST-layer failures (spec.md C4: `RestClient`).

use thiserror::Error;

/// Failures from a [`super::RestClient`] snapshot fetch.
#[derive(Debug, Error)]
pub enum RestError {
    /// The server responded with a non-success status.
    #[error("http {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated for logging.
        body: String,
    },

    /// The response body did not match the expected snapshot shape.
    #[error("malformed snapshot response: {0}")]
    Decode(String),

    /// All retries were exhausted.
    #[error("exhausted {attempts} retries, last error: {last}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The last error seen.
        last: String,
    },
}
