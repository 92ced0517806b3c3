//! CLI argument parsing with clap
//!
//! This module defines the command-line interface structure using clap,
//! including all commands, arguments, and their documentation.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::build;

/// Leader election and exclusive job scheduling for a fleet of instances
#[derive(Parser, Debug)]
#[command(name = "fleet-coord")]
#[command(about = "Leader election and exclusive job scheduling for a fleet of instances")]
#[command(long_about = "
fleet-coord runs one coordination node per application instance. Nodes share a
key-value store; each publishes a heartbeat record, takes part in leader
election and runs scheduled jobs so that every firing executes on at most one
instance.

EXAMPLES:
    # Join the fleet with the default configuration
    fleet-coord run

    # Join a specific project under a fixed instance id
    fleet-coord run --project billing --instance-id billing-1

    # Use a custom configuration file
    fleet-coord --config /etc/fleet-coord/production.toml run

    # Development mode with verbose logging
    fleet-coord --env development --verbose run

    # Check configuration and job schedules without joining the fleet
    fleet-coord run --dry-run

    # Show the live instances and the current leader
    fleet-coord status
")]
#[command(version = build::CLAP_LONG_VERSION)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Load a single TOML file instead of the layered `config/` directory.
    /// The file must exist and be readable.
    ///
    /// Example: --config /etc/fleet-coord/production.toml
    #[arg(short, long, value_name = "FILE", value_parser = super::validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection
    ///
    /// Selects the `{environment}.toml` layer and the environment tag written
    /// into this instance's heartbeat record.
    ///
    /// Available values: development (dev), test, staging, production (prod)
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Enable verbose logging
    ///
    /// Raises the log level to debug. Cannot be used with --quiet.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-error output
    ///
    /// Lowers the log level to error. Cannot be used with --verbose.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Join the fleet and run until interrupted (default)
    ///
    /// Connects to the coordination store, starts heartbeating, takes part in
    /// leader election and schedules the configured jobs. Ctrl+C or SIGTERM
    /// stops the node and removes its heartbeat record.
    ///
    /// Examples:
    ///   fleet-coord run                          # Start with defaults
    ///   fleet-coord run --instance-id worker-3   # Fixed instance id
    ///   fleet-coord run --dry-run                # Validate and list jobs
    Run {
        /// Project tag scoping every coordination key
        #[arg(long, value_name = "PROJECT", value_parser = super::validation::validate_project)]
        project: Option<String>,

        /// Instance id to publish instead of a generated one
        #[arg(long, value_name = "ID", value_parser = super::validation::validate_instance_id)]
        instance_id: Option<String>,

        /// Log level override
        ///
        /// Overrides both the configuration file and --verbose/--quiet.
        ///
        /// Available levels: error, warn, info, debug, trace
        #[arg(long, value_enum)]
        log_level: Option<LogLevel>,

        /// Validate configuration and job schedules, then exit
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the live instances and the current leader
    ///
    /// Read-only: this command never publishes a heartbeat or touches the
    /// leader key.
    Status {
        /// Project tag to inspect
        #[arg(long, value_name = "PROJECT", value_parser = super::validation::validate_project)]
        project: Option<String>,

        /// Print the instance list as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Environment options
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "test")]
    Test,
    #[value(name = "staging")]
    Staging,
    #[value(name = "production", alias = "prod")]
    Production,
}

/// Log level options
#[derive(ValueEnum, Clone, Debug)]
pub enum LogLevel {
    #[value(name = "error")]
    Error,
    #[value(name = "warn", alias = "warning")]
    Warn,
    #[value(name = "info")]
    Info,
    #[value(name = "debug")]
    Debug,
    #[value(name = "trace")]
    Trace,
}

impl Cli {
    /// Validate argument combinations clap cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use --verbose and --quiet together".to_string());
        }

        if let Some(Commands::Run {
            dry_run: true,
            instance_id: Some(_),
            ..
        }) = self.command
        {
            return Err("--instance-id has no effect with --dry-run".to_string());
        }

        Ok(())
    }

    /// Whether this invocation joins the fleet
    pub fn is_run(&self) -> bool {
        matches!(self.command, None | Some(Commands::Run { .. }))
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => "error".to_string(),
            LogLevel::Warn => "warn".to_string(),
            LogLevel::Info => "info".to_string(),
            LogLevel::Debug => "debug".to_string(),
            LogLevel::Trace => "trace".to_string(),
        }
    }
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Test => crate::config::Environment::Test,
            Environment::Staging => crate::config::Environment::Staging,
            Environment::Production => crate::config::Environment::Production,
        }
    }
}
