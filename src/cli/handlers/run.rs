//! Run command handler
//!
//! Handles the run command including dry-run validation and joining the fleet.

use crate::config::{Environment, Settings};
use crate::error::AppResult;
use crate::node::{JobPlan, Node};

/// Handler for the run command
pub struct RunCommandHandler {
    config: Settings,
    environment: Environment,
}

impl RunCommandHandler {
    /// Create a new run command handler
    pub fn new(config: Settings, environment: Environment) -> Self {
        Self {
            config,
            environment,
        }
    }

    /// Execute the run command with optional dry-run support
    ///
    /// Without `dry_run` this blocks until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    /// - Configuration validation errors
    /// - Job scheduler startup errors (if not dry-run)
    pub async fn execute(&self, dry_run: bool) -> AppResult<()> {
        if dry_run {
            self.validate_only()
        } else {
            Node::new(self.config.clone(), self.environment).run().await
        }
    }

    /// Validate configuration and job schedules without joining the fleet
    pub fn validate_only(&self) -> AppResult<()> {
        let plan = Node::new(self.config.clone(), self.environment).dry_run()?;

        println!("✓ Configuration is valid");
        println!(
            "✓ Project '{}' in {} environment",
            self.config.application.project, self.environment
        );
        println!("✓ Store backend: {:?}", self.config.store.backend);
        self.print_jobs(&plan);

        println!("Dry run completed successfully - configuration is ready for deployment");
        Ok(())
    }

    fn print_jobs(&self, plan: &JobPlan) {
        if !self.config.jobs.enabled {
            println!("✓ Job scheduling disabled");
        }

        for definition in &plan.definitions {
            println!(
                "✓ Job '{}' at '{}'{}",
                definition.name,
                definition.schedule,
                if definition.leader_only { " (leader only)" } else { "" }
            );
        }

        if plan.skipped > 0 {
            println!("✗ {} configured job(s) rejected, see log for details", plan.skipped);
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Settings {
        &self.config
    }
}
