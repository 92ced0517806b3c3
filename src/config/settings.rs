//! Configuration settings structures for fleet-coord
//!
//! This module defines all configuration structures that can be loaded from
//! TOML files and environment variables.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::config::error::ConfigError;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig};

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "fleet-coord".to_string()
}

fn default_project() -> String {
    "fleet".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "logs/app.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_redis_pool_size() -> u32 {
    4
}

fn default_redis_connection_timeout() -> u64 {
    5
}

fn default_health_check_interval() -> u64 {
    10
}

fn default_key_expiry_secs() -> u64 {
    120
}

fn default_min_heartbeat_secs() -> u64 {
    30
}

fn default_max_heartbeat_secs() -> u64 {
    60
}

fn default_lock_ttl_ms() -> u64 {
    120_000
}

fn default_job_timeout() -> u64 {
    300
}

// ============================================================================
// Application Configuration
// ============================================================================

/// Application basic information configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Project tag scoping every coordination key, so several deployments
    /// can share one store without colliding
    #[serde(default = "default_project")]
    pub project: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            project: default_project(),
        }
    }
}

// ============================================================================
// Logger Settings (compatible with LoggerConfig)
// ============================================================================

/// Console output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    /// Whether console output is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Whether to use colored output
    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            colored: default_true(),
        }
    }
}

/// File output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    /// Whether file output is enabled
    #[serde(default)]
    pub enabled: bool,

    /// Path to the log file
    #[serde(default = "default_log_path")]
    pub path: String,

    /// Whether to append to existing file
    #[serde(default = "default_true")]
    pub append: bool,

    /// Log format: "full", "compact", or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            append: default_true(),
            format: default_log_format(),
        }
    }
}

/// Logger configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Log level or filter directive, e.g. "info" or "fleet_coord=debug"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Console output settings
    #[serde(default)]
    pub console: ConsoleSettings,

    /// File output settings
    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Convert LoggerSettings to the runtime LoggerConfig
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let file = self.file.into_file_config()?;
        Ok(LoggerConfig {
            console: self.console.into_console_config(),
            file,
            level: self.level,
        })
    }
}

impl ConsoleSettings {
    /// Convert ConsoleSettings to ConsoleConfig
    pub fn into_console_config(self) -> ConsoleConfig {
        ConsoleConfig::new(self.enabled, self.colored)
    }
}

impl FileSettings {
    /// Convert FileSettings to FileConfig
    pub fn into_file_config(self) -> Result<FileConfig, ConfigError> {
        let format = self.parse_format()?;
        Ok(FileConfig {
            enabled: self.enabled,
            path: PathBuf::from(self.path),
            append: self.append,
            format,
        })
    }

    fn parse_format(&self) -> Result<LogFormat, ConfigError> {
        self.format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::invalid("logger.file.format", e.to_string()))
    }
}

// ============================================================================
// Store Configuration
// ============================================================================

/// Coordination store backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
    None,
}

/// Redis connection configuration
///
/// Either `url` is set, or the URL is assembled from host, port and the
/// optional credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisStoreConfig {
    /// Full connection URL; takes precedence over host/port when non-empty
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_redis_host")]
    pub host: String,

    #[serde(default = "default_redis_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Maximum number of pooled connections
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_redis_connection_timeout")]
    pub connection_timeout: u64,

    /// Seconds between availability checks
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval: u64,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            host: default_redis_host(),
            port: default_redis_port(),
            username: String::new(),
            password: String::new(),
            pool_size: default_redis_pool_size(),
            connection_timeout: default_redis_connection_timeout(),
            health_check_interval: default_health_check_interval(),
        }
    }
}

impl RedisStoreConfig {
    /// Connection URL, `redis://[user[:password]@]host:port` when no explicit
    /// url is configured.
    pub fn connection_url(&self) -> String {
        if !self.url.is_empty() {
            return self.url.clone();
        }

        let has_user = !self.username.is_empty();
        let credentials = match (has_user, self.password.is_empty()) {
            (true, true) => self.username.clone(),
            (true, false) => format!("{}:{}", self.username, self.password),
            (false, false) => self.password.clone(),
            (false, true) => String::new(),
        };

        if credentials.is_empty() {
            format!("redis://{}:{}", self.host, self.port)
        } else {
            format!("redis://{}@{}:{}", credentials, self.host, self.port)
        }
    }

    /// Host description safe to log (no credentials).
    pub fn display_host(&self) -> String {
        if self.url.is_empty() {
            return format!("{}:{}", self.host, self.port);
        }
        let without_scheme = self.url.split("://").last().unwrap_or_default();
        without_scheme
            .rsplit('@')
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

/// Coordination store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Store backend type
    #[serde(default)]
    pub backend: StoreBackend,

    /// Redis configuration
    #[serde(default)]
    pub redis: RedisStoreConfig,
}

// ============================================================================
// Coordination Configuration
// ============================================================================

/// Heartbeat, election and lock settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Whether this instance publishes heartbeats and takes part in election
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// TTL of an instance record, in seconds
    #[serde(default = "default_key_expiry_secs")]
    pub key_expiry_secs: u64,

    /// Lower bound of the randomized heartbeat delay, in seconds
    #[serde(default = "default_min_heartbeat_secs")]
    pub min_heartbeat_secs: u64,

    /// Width of the randomized heartbeat window, in seconds
    #[serde(default = "default_max_heartbeat_secs")]
    pub max_heartbeat_secs: u64,

    /// Lock TTL used when a caller does not pick one, in milliseconds
    #[serde(default = "default_lock_ttl_ms")]
    pub default_lock_ttl_ms: u64,

    /// Prefix for lock keys; defaults to `lock-{project}:`
    #[serde(default)]
    pub lock_prefix: Option<String>,

    /// Explicit instance id, overriding orchestrator and random ids
    #[serde(default)]
    pub instance_id: Option<String>,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            key_expiry_secs: default_key_expiry_secs(),
            min_heartbeat_secs: default_min_heartbeat_secs(),
            max_heartbeat_secs: default_max_heartbeat_secs(),
            default_lock_ttl_ms: default_lock_ttl_ms(),
            lock_prefix: None,
            instance_id: None,
        }
    }
}

// ============================================================================
// Jobs Configuration
// ============================================================================

/// A job declared in configuration and built through the task factory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinitionConfig {
    /// Job name; also the base of its lock key
    pub name: String,

    /// Cron expression, seconds field first
    pub schedule: String,

    /// Registered task type to instantiate
    pub task_type: String,

    /// Task payload passed to the factory
    #[serde(default)]
    pub payload: Option<JsonValue>,

    /// Only run on the elected leader
    #[serde(default)]
    pub leader_only: bool,

    /// Lock TTL override, in milliseconds
    #[serde(default)]
    pub lock_ttl_ms: Option<u64>,
}

/// Job scheduling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Whether job scheduling is enabled
    #[serde(default)]
    pub enabled: bool,

    /// Job execution timeout in seconds
    #[serde(default = "default_job_timeout")]
    pub job_timeout: u64,

    /// Lock TTL for job firings, in milliseconds; falls back to
    /// `coordination.default_lock_ttl_ms`
    #[serde(default)]
    pub lock_ttl_ms: Option<u64>,

    /// Include the firing second in the lock key so clock-skewed instances
    /// firing the same tick contend on the same key
    #[serde(default)]
    pub lock_per_fire_time: bool,

    /// Jobs built from configuration
    #[serde(default)]
    pub definitions: Vec<JobDefinitionConfig>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            job_timeout: default_job_timeout(),
            lock_ttl_ms: None,
            lock_per_fire_time: false,
            definitions: Vec::new(),
        }
    }
}

// ============================================================================
// Root Settings
// ============================================================================

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Application information
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Logger configuration
    #[serde(default)]
    pub logger: LoggerSettings,

    /// Coordination store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Heartbeat, election and lock configuration
    #[serde(default)]
    pub coordination: CoordinationConfig,

    /// Job scheduling configuration
    #[serde(default)]
    pub jobs: JobsConfig,
}
