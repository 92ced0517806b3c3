//! Configuration validation logic
//!
//! This module provides validation methods for all configuration structures
//! to ensure configuration values are within acceptable ranges and formats.

use crate::config::error::ConfigError;
use crate::config::settings::{
    ApplicationConfig, CoordinationConfig, FileSettings, JobsConfig, LoggerSettings,
    StoreBackend, StoreConfig, Settings,
};

/// Valid log levels
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid log formats
const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

impl ApplicationConfig {
    /// Validate application configuration
    ///
    /// The project tag ends up inside store keys, so it must be non-empty and
    /// free of the `:` separator and glob metacharacters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project.trim().is_empty() {
            return Err(ConfigError::invalid(
                "application.project",
                "Project tag is required; it scopes all coordination keys.",
            ));
        }

        if self
            .project
            .chars()
            .any(|c| matches!(c, ':' | '*' | '?' | '[' | ']') || c.is_whitespace())
        {
            return Err(ConfigError::Invalid {
                field: "application.project".to_string(),
                message: format!(
                    "Project tag '{}' may not contain ':', glob characters or whitespace.",
                    self.project
                ),
            });
        }

        Ok(())
    }
}

impl FileSettings {
    /// Validate file settings
    fn validate(&self) -> Result<(), ConfigError> {
        // If file logging is enabled, path must not be empty
        if self.enabled && self.path.trim().is_empty() {
            return Err(ConfigError::invalid(
                "logger.file.path",
                "File path is required when file logging is enabled.",
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid {
                field: "logger.file.format".to_string(),
                message: format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        Ok(())
    }
}

impl LoggerSettings {
    /// Validate logger settings
    ///
    /// # Validation Rules
    /// - Level must be a plain level or an `EnvFilter` directive list
    /// - If file logging is enabled, path must not be empty
    /// - Log format must be one of: full, compact, json
    pub fn validate(&self) -> Result<(), ConfigError> {
        let is_plain_level = VALID_LOG_LEVELS.contains(&self.level.to_lowercase().as_str());
        if !is_plain_level && tracing_subscriber::EnvFilter::try_new(&self.level).is_err() {
            return Err(ConfigError::Invalid {
                field: "logger.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Valid levels are: {} (or a filter directive)",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        if !self.console.enabled && !self.file.enabled {
            return Err(ConfigError::invalid(
                "logger",
                "At least one output (console or file) must be enabled.",
            ));
        }

        self.file.validate()?;

        Ok(())
    }
}

impl StoreConfig {
    /// Validate store configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend != StoreBackend::Redis {
            return Ok(());
        }

        let redis = &self.redis;
        if redis.url.is_empty() && redis.host.trim().is_empty() {
            return Err(ConfigError::invalid(
                "store.redis",
                "Either store.redis.url or store.redis.host must be set.",
            ));
        }

        if !redis.url.is_empty()
            && !(redis.url.starts_with("redis://") || redis.url.starts_with("rediss://"))
        {
            return Err(ConfigError::invalid(
                "store.redis.url",
                "Redis URL must start with redis:// or rediss://.",
            ));
        }

        if redis.pool_size == 0 {
            return Err(ConfigError::invalid(
                "store.redis.pool_size",
                "Pool size must be greater than 0.",
            ));
        }

        if redis.connection_timeout == 0 {
            return Err(ConfigError::invalid(
                "store.redis.connection_timeout",
                "Connection timeout must be greater than 0 seconds.",
            ));
        }

        if redis.health_check_interval == 0 {
            return Err(ConfigError::invalid(
                "store.redis.health_check_interval",
                "Health check interval must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl CoordinationConfig {
    /// Validate coordination configuration
    ///
    /// # Validation Rules
    /// - TTLs and the minimum heartbeat delay must be positive
    /// - The longest possible heartbeat delay must be shorter than the
    ///   record TTL, otherwise a healthy instance could drop out of the
    ///   live set between two heartbeats
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_expiry_secs == 0 {
            return Err(ConfigError::invalid(
                "coordination.key_expiry_secs",
                "Instance record TTL must be greater than 0 seconds.",
            ));
        }

        if self.min_heartbeat_secs == 0 {
            return Err(ConfigError::invalid(
                "coordination.min_heartbeat_secs",
                "Minimum heartbeat delay must be greater than 0 seconds.",
            ));
        }

        let Some(longest) = self
            .min_heartbeat_secs
            .checked_add(self.max_heartbeat_secs)
            .filter(|secs| secs.checked_mul(1000).is_some())
        else {
            return Err(ConfigError::invalid(
                "coordination.max_heartbeat_secs",
                "Heartbeat delay window is out of range.",
            ));
        };
        if longest >= self.key_expiry_secs {
            return Err(ConfigError::Invalid {
                field: "coordination.key_expiry_secs".to_string(),
                message: format!(
                    "Record TTL ({}s) must exceed the longest heartbeat delay ({}s).",
                    self.key_expiry_secs, longest
                ),
            });
        }

        if self.default_lock_ttl_ms == 0 {
            return Err(ConfigError::invalid(
                "coordination.default_lock_ttl_ms",
                "Default lock TTL must be greater than 0 milliseconds.",
            ));
        }

        if let Some(id) = &self.instance_id
            && (id.trim().is_empty() || id.contains(':'))
        {
            return Err(ConfigError::invalid(
                "coordination.instance_id",
                "Instance id must be non-empty and may not contain ':'.",
            ));
        }

        Ok(())
    }
}

impl JobsConfig {
    /// Validate job configuration
    ///
    /// Definitions are not checked here: a bad schedule or a duplicate name
    /// only drops that job at load time and must not prevent startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.job_timeout == 0 {
            return Err(ConfigError::invalid(
                "jobs.job_timeout",
                "Job timeout must be greater than 0 seconds.",
            ));
        }

        if self.lock_ttl_ms == Some(0) {
            return Err(ConfigError::invalid(
                "jobs.lock_ttl_ms",
                "Job lock TTL must be greater than 0 milliseconds.",
            ));
        }

        Ok(())
    }
}

impl Settings {
    /// Validate all configuration settings
    ///
    /// This method validates all sub-configurations and returns the first
    /// validation error encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.application.validate()?;
        self.logger.validate()?;
        self.store.validate()?;
        self.coordination.validate()?;
        self.jobs.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::JobDefinitionConfig;

    fn definition(name: &str) -> JobDefinitionConfig {
        JobDefinitionConfig {
            name: name.to_string(),
            schedule: "0 * * * * *".to_string(),
            task_type: "instance_report".to_string(),
            payload: None,
            leader_only: false,
            lock_ttl_ms: None,
        }
    }

    #[test]
    fn test_settings_default_is_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_application_empty_project() {
        let config = ApplicationConfig {
            project: "  ".to_string(),
            ..ApplicationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_application_project_with_separator() {
        let config = ApplicationConfig {
            project: "shop:eu".to_string(),
            ..ApplicationConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("application.project"));
    }

    #[test]
    fn test_logger_settings_valid_levels() {
        for level in VALID_LOG_LEVELS {
            let settings = LoggerSettings {
                level: level.to_string(),
                ..LoggerSettings::default()
            };
            assert!(settings.validate().is_ok(), "level {level} should be valid");
        }
    }

    #[test]
    fn test_logger_settings_filter_directive() {
        let settings = LoggerSettings {
            level: "warn,fleet_coord=debug".to_string(),
            ..LoggerSettings::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_logger_settings_no_outputs() {
        let mut settings = LoggerSettings::default();
        settings.console.enabled = false;
        settings.file.enabled = false;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_logger_settings_file_enabled_empty_path() {
        let mut settings = LoggerSettings::default();
        settings.file.enabled = true;
        settings.file.path = String::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_store_redis_bad_scheme() {
        let mut config = StoreConfig::default();
        config.redis.url = "http://localhost:6379".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_memory_ignores_redis_section() {
        let mut config = StoreConfig {
            backend: StoreBackend::Memory,
            ..StoreConfig::default()
        };
        config.redis.pool_size = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_coordination_heartbeat_window_must_fit_ttl() {
        let config = CoordinationConfig {
            key_expiry_secs: 90,
            min_heartbeat_secs: 30,
            max_heartbeat_secs: 60,
            ..CoordinationConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "coordination.key_expiry_secs"));
    }

    #[test]
    fn test_coordination_heartbeat_window_overflow() {
        let config = CoordinationConfig {
            key_expiry_secs: u64::MAX,
            min_heartbeat_secs: u64::MAX,
            max_heartbeat_secs: 1,
            ..CoordinationConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.field(), Some("coordination.max_heartbeat_secs"));

        let config = CoordinationConfig {
            key_expiry_secs: u64::MAX,
            min_heartbeat_secs: u64::MAX / 100,
            max_heartbeat_secs: 0,
            ..CoordinationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_coordination_zero_min_heartbeat() {
        let config = CoordinationConfig {
            min_heartbeat_secs: 0,
            ..CoordinationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_coordination_instance_id_with_separator() {
        let config = CoordinationConfig {
            instance_id: Some("a:b".to_string()),
            ..CoordinationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_jobs_duplicate_names_are_not_a_config_error() {
        let config = JobsConfig {
            definitions: vec![definition("report"), definition("report")],
            ..JobsConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_jobs_bad_schedule_is_not_a_config_error() {
        let mut bad = definition("report");
        bad.schedule = "not a schedule".to_string();
        let config = JobsConfig {
            definitions: vec![bad],
            ..JobsConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
