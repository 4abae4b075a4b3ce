//! Policy engine error types.

use thiserror::Error;

use fleetscale_client::ClientError;

pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors that abort an evaluation.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("session lookup for {address} failed: {source}")]
    SessionLookup {
        address: String,
        #[source]
        source: ClientError,
    },
}
