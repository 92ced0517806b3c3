//! Deployment environment the node runs in
//!
//! The environment picks the `{name}.toml` layer, the short tag published in
//! heartbeat records and whether orchestrator task metadata names the instance.

use std::fmt;
use std::str::FromStr;

use crate::config::error::ConfigError;

/// Variable selecting the environment when `--env` is not given
pub const APP_ENV_VAR: &str = "FLEET_APP_ENV";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Staging,
    Production,
}

impl Environment {
    pub const ALL: [Environment; 4] = [
        Environment::Development,
        Environment::Test,
        Environment::Staging,
        Environment::Production,
    ];

    /// Read [`APP_ENV_VAR`]. Unset or blank means development; anything else
    /// must name an environment so a typo cannot silently demote a production
    /// node.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(APP_ENV_VAR) {
            Ok(value) if !value.trim().is_empty() => value.parse(),
            _ => Ok(Environment::default()),
        }
    }

    /// Name of the environment layer file, without `.toml`
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    /// Short tag published in instance records
    pub fn tag(&self) -> &'static str {
        match self {
            Environment::Development => "dev",
            Environment::Test => "test",
            Environment::Staging => "stage",
            Environment::Production => "prod",
        }
    }

    /// Whether orchestrator metadata should be consulted for identity
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    /// Accepts the layer name or the record tag, ignoring case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Environment::ALL
            .into_iter()
            .find(|env| env.as_str() == wanted || env.tag() == wanted)
            .ok_or_else(|| ConfigError::UnknownEnvironment(s.to_string()))
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
