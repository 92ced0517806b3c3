//! Configuration error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, merging or validating settings
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer the node cannot start without is absent
    #[error("Required configuration file is missing: {}", .0.display())]
    MissingFile(PathBuf),

    /// A setting holds a value the node cannot coordinate with
    #[error("Invalid setting `{field}`: {message}")]
    Invalid {
        /// Dotted path of the offending setting, e.g. `coordination.key_expiry_secs`
        field: String,
        message: String,
    },

    /// `FLEET_APP_ENV` or `--env` named no known environment
    #[error("Unknown environment '{0}', expected one of: development, test, staging, production")]
    UnknownEnvironment(String),

    /// Both a layered directory and a single file were requested
    #[error(
        "FLEET_CONFIG_DIR ({}) and FLEET_CONFIG_FILE ({}) cannot both be set",
        .dir.display(),
        .file.display()
    )]
    ConflictingSources { dir: PathBuf, file: PathBuf },

    /// Reading or deserializing a source failed
    #[error("Configuration source error: {0}")]
    Source(#[from] config::ConfigError),
}

impl ConfigError {
    /// Reject the value of `field`
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Settings key the error points at, when there is one
    pub fn field(&self) -> Option<&str> {
        match self {
            ConfigError::Invalid { field, .. } => Some(field),
            _ => None,
        }
    }
}
