use thiserror::Error;

use crate::config::error::ConfigError;
use crate::jobs::JobError;
use crate::store::StoreError;

/// Application-wide error type.
///
/// Coordination code paths never surface these to the process: heartbeat,
/// election and lock failures are logged and swallowed at the call site.
/// `AppError` is what the outer layers (node startup, CLI commands, job task
/// bodies) return.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error with entity, field, and value information
    #[error("Resource not found: {entity} with {field}={value}")]
    NotFound {
        entity: String,
        field: String,
        value: String,
    },

    /// Validation error with field-specific details
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Coordination store error with operation context
    #[error("Coordination store operation failed: {operation}")]
    Store {
        operation: String,
        #[source]
        source: StoreError,
    },

    /// Job scheduling or execution error
    #[error("Job error")]
    Job {
        #[source]
        source: JobError,
    },

    /// Configuration error with key information
    #[error("Configuration error: {key}")]
    Configuration {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Internal error for unexpected failures
    #[error("Internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn store(operation: impl Into<String>, source: StoreError) -> Self {
        AppError::Store {
            operation: operation.into(),
            source,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

impl From<JobError> for AppError {
    fn from(error: JobError) -> Self {
        AppError::Job { source: error }
    }
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        let key = error.field().unwrap_or("settings").to_string();
        AppError::Configuration {
            key,
            source: anyhow::Error::from(error),
        }
    }
}

/// Type alias for Result with AppError to simplify function signatures
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_from_config_keeps_field() {
        let err: AppError = ConfigError::invalid("coordination.key_expiry_secs", "must be positive").into();
        match err {
            AppError::Configuration { key, .. } => assert_eq!(key, "coordination.key_expiry_secs"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_store_error_display() {
        let err = AppError::store("scan instances", StoreError::Unavailable);
        assert_eq!(
            err.to_string(),
            "Coordination store operation failed: scan instances"
        );
    }
}
