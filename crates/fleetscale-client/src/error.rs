//! Client error types.

use thiserror::Error;

/// Result type alias for collaborator calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors returned by collaborator clients.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("service unavailable: {0}")]
    Unavailable(String),
}
