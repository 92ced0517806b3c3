//! Configuration merger for CLI arguments and config files
//!
//! This module handles merging CLI argument overrides with file-based configuration,
//! implementing the configuration precedence logic.

use super::parser::{Cli, Commands};
use crate::config::error::ConfigError;
use crate::config::{ConfigLoader, Environment, Settings};

/// Configuration merger that handles CLI argument integration with file-based configuration
///
/// CLI arguments override configuration file values and `FLEET_*` variables.
pub struct ConfigurationMerger {
    base_config: Settings,
    environment: Environment,
}

impl ConfigurationMerger {
    /// Create a new configuration merger with base configuration
    pub fn new(base_config: Settings, environment: Environment) -> Self {
        Self {
            base_config,
            environment,
        }
    }

    /// Load the base configuration honouring `--config` and `--env`
    ///
    /// # Errors
    /// Returns ConfigError if configuration loading or validation fails
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let loader = ConfigLoader::with_overrides(cli.config.clone(), cli.env.map(Into::into))?;
        let environment = loader.environment();
        let config = loader.load()?;

        Ok(Self::new(config, environment))
    }

    /// Merge CLI arguments with the base configuration
    ///
    /// Precedence, highest first:
    /// 1. Command-specific arguments (`run --log-level`, `--project`, ...)
    /// 2. Global flags (`--verbose`, `--quiet`)
    /// 3. Configuration files and environment variables
    pub fn merge_cli_args(&self, cli: &Cli) -> Result<Settings, ConfigError> {
        let mut config = self.base_config.clone();

        Self::apply_global_overrides(&mut config, cli);

        if let Some(ref command) = cli.command {
            Self::apply_command_overrides(&mut config, command);
        }

        config.validate()?;

        Ok(config)
    }

    fn apply_global_overrides(config: &mut Settings, cli: &Cli) {
        if cli.verbose {
            config.logger.level = "debug".to_string();
        } else if cli.quiet {
            config.logger.level = "error".to_string();
        }
    }

    fn apply_command_overrides(config: &mut Settings, command: &Commands) {
        match command {
            Commands::Run {
                project,
                instance_id,
                log_level,
                dry_run: _,
            } => {
                if let Some(project) = project {
                    config.application.project = project.clone();
                }

                if let Some(id) = instance_id {
                    config.coordination.instance_id = Some(id.clone());
                }

                if let Some(level) = log_level {
                    config.logger.level = level.clone().into();
                }
            }
            Commands::Status { project, json: _ } => {
                if let Some(project) = project {
                    config.application.project = project.clone();
                }
                // Status only reads the store
                config.jobs.enabled = false;
            }
        }
    }

    /// Get the base configuration, before CLI overrides
    pub fn config(&self) -> &Settings {
        &self.base_config
    }

    /// Environment the configuration was loaded for
    pub fn environment(&self) -> Environment {
        self.environment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn merger() -> ConfigurationMerger {
        ConfigurationMerger::new(Settings::default(), Environment::Test)
    }

    #[test]
    fn test_configuration_merger_new() {
        let base_config = Settings::default();
        let merger = ConfigurationMerger::new(base_config.clone(), Environment::Staging);
        assert_eq!(merger.config(), &base_config);
        assert_eq!(merger.environment(), Environment::Staging);
    }

    #[test]
    fn test_configuration_merger_merge_verbose_flag() {
        let cli = Cli::try_parse_from(["fleet-coord", "--verbose"]).unwrap();
        let merged_config = merger().merge_cli_args(&cli).unwrap();

        assert_eq!(merged_config.logger.level, "debug");
    }

    #[test]
    fn test_configuration_merger_merge_quiet_flag() {
        let cli = Cli::try_parse_from(["fleet-coord", "--quiet"]).unwrap();
        let merged_config = merger().merge_cli_args(&cli).unwrap();

        assert_eq!(merged_config.logger.level, "error");
    }

    #[test]
    fn test_configuration_merger_merge_run_identity() {
        let cli = Cli::try_parse_from([
            "fleet-coord",
            "run",
            "--project",
            "billing",
            "--instance-id",
            "billing-7",
        ])
        .unwrap();
        let merged_config = merger().merge_cli_args(&cli).unwrap();

        assert_eq!(merged_config.application.project, "billing");
        assert_eq!(
            merged_config.coordination.instance_id.as_deref(),
            Some("billing-7")
        );
    }

    #[test]
    fn test_configuration_merger_command_log_level_overrides_global() {
        let cli = Cli::try_parse_from(["fleet-coord", "--verbose", "run", "--log-level", "warn"])
            .unwrap();
        let merged_config = merger().merge_cli_args(&cli).unwrap();

        assert_eq!(merged_config.logger.level, "warn");
    }

    #[test]
    fn test_configuration_merger_status_disables_jobs() {
        let mut base = Settings::default();
        base.jobs.enabled = true;
        let merger = ConfigurationMerger::new(base, Environment::Test);

        let cli = Cli::try_parse_from(["fleet-coord", "status", "--project", "shop"]).unwrap();
        let merged_config = merger.merge_cli_args(&cli).unwrap();

        assert!(!merged_config.jobs.enabled);
        assert_eq!(merged_config.application.project, "shop");
    }
}
