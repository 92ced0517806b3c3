//! Command executor for dispatching CLI commands
//!
//! This module provides the main entry point for executing CLI commands
//! after parsing and configuration loading.

use super::handlers::{RunCommandHandler, StatusCommandHandler};
use super::parser::{Cli, Commands};
use crate::config::{Environment, Settings};
use crate::error::{AppError, AppResult};

/// Execute a CLI command with the given settings
///
/// `run` (also the default when no command is given) blocks until the node
/// is asked to shut down.
///
/// # Errors
/// Returns errors from command handlers or validation failures
pub async fn execute_command(cli: &Cli, settings: Settings, environment: Environment) -> AppResult<()> {
    validate_command_args(cli)?;

    match &cli.command {
        Some(Commands::Run { dry_run, .. }) => {
            RunCommandHandler::new(settings, environment)
                .execute(*dry_run)
                .await
        }
        None => RunCommandHandler::new(settings, environment).execute(false).await,
        Some(Commands::Status { json, .. }) => {
            StatusCommandHandler::new(settings, environment)
                .execute(*json)
                .await
        }
    }
}

/// Validate command arguments before execution
fn validate_command_args(cli: &Cli) -> AppResult<()> {
    cli.validate().map_err(|reason| AppError::Validation {
        field: "cli_arguments".to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::StoreBackend;
    use clap::Parser;

    fn create_valid_config() -> Settings {
        let mut config = Settings::default();
        config.store.backend = StoreBackend::Memory;
        config
    }

    #[tokio::test]
    async fn test_execute_run_dry_run() {
        let cli = Cli::try_parse_from(["fleet-coord", "run", "--dry-run"]).unwrap();

        let result = execute_command(&cli, create_valid_config(), Environment::Test).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_execute_status_on_empty_fleet() {
        let cli = Cli::try_parse_from(["fleet-coord", "status"]).unwrap();

        let result = execute_command(&cli, create_valid_config(), Environment::Test).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_validate_conflicting_args() {
        let cli = Cli {
            command: Some(Commands::Run {
                project: None,
                instance_id: Some("node-1".to_string()),
                log_level: None,
                dry_run: true,
            }),
            config: None,
            env: None,
            verbose: false,
            quiet: false,
        };

        let result = execute_command(&cli, create_valid_config(), Environment::Test).await;
        assert!(matches!(result, Err(AppError::Validation { .. })));
    }
}
