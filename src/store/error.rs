//! Coordination store error types.

use thiserror::Error;

/// Errors that can occur during coordination store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store is not reachable. Callers treat this as "skip this cycle".
    #[error("Coordination store unavailable")]
    Unavailable,

    #[error("Store operation failed: {0}")]
    Operation(String),

    #[error("Store connection failed: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether this error means the connection itself is gone, as opposed to
    /// a single command failing.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, StoreError::Unavailable | StoreError::Connection(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        StoreError::Serialization(error.to_string())
    }
}
