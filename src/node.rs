//! Node lifecycle
//!
//! A node is one running instance of the fleet. Starting it connects the
//! coordination store, starts the instance registry and schedules jobs;
//! stopping it tears them down in reverse order.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::signal;

use crate::config::{Environment, JobsConfig, Settings};
use crate::coordination::CoordinationContext;
use crate::error::{AppError, AppResult};
use crate::instances::{InstanceIdentity, InstanceRegistry, InstanceView};
use crate::jobs::{ExecutorSettings, JobDefinition, JobExecutor, JobRegistry, JobScheduler};
use crate::store::{StoreManager, UnavailableStore};

/// Jobs that survived loading, plus how many configured entries were dropped.
pub struct JobPlan {
    pub definitions: Vec<JobDefinition>,
    pub skipped: usize,
}

/// Build the job plan from the registry's code-discovered jobs and the
/// configured definitions.
pub fn plan_jobs(mut registry: JobRegistry, config: &JobsConfig) -> JobPlan {
    let loaded = registry.load_definitions(&config.definitions);
    let skipped = config.definitions.len() - loaded;
    if skipped > 0 {
        tracing::warn!(skipped, loaded, "Some configured jobs were rejected");
    }

    JobPlan {
        definitions: registry.into_definitions(),
        skipped,
    }
}

/// Snapshot of the fleet as seen from the store.
#[derive(Debug, Serialize)]
pub struct FleetStatus {
    pub project: String,
    pub leader: Option<String>,
    pub instances: Vec<InstanceView>,
}

/// A configured, not yet started node.
pub struct Node {
    settings: Settings,
    environment: Environment,
    jobs: JobRegistry,
}

impl Node {
    pub fn new(settings: Settings, environment: Environment) -> Self {
        Self {
            settings,
            environment,
            jobs: JobRegistry::with_builtin_tasks(),
        }
    }

    /// Use a job registry carrying extra task types or jobs discovered from
    /// code. Configured definitions are loaded into it on start.
    pub fn with_job_registry(mut self, jobs: JobRegistry) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Validate configuration and load every job without touching the store.
    pub fn dry_run(self) -> AppResult<JobPlan> {
        self.settings.validate()?;
        Ok(plan_jobs(self.jobs, &self.settings.jobs))
    }

    /// Connect to the configured store and start.
    ///
    /// A store that cannot be set up at all is replaced by an unavailable
    /// backend: the node keeps running with coordination disabled.
    pub async fn start(self) -> AppResult<RunningNode> {
        let store = connect_store(&self.settings).await;
        self.start_with_store(store).await
    }

    /// Start against an already-built store.
    pub async fn start_with_store(self, store: StoreManager) -> AppResult<RunningNode> {
        let Node {
            settings,
            environment,
            jobs,
        } = self;

        tracing::info!(
            app_name = %settings.application.name,
            version = crate::pkg_version(),
            environment = %environment,
            project = %settings.application.project,
            backend = ?settings.store.backend,
            "Node starting"
        );

        let identity = InstanceIdentity::resolve(&settings.coordination, environment).await;
        let ctx = CoordinationContext::new(
            store.backend(),
            &settings.application.project,
            settings.coordination.clone(),
            identity,
        );

        let registry = Arc::new(InstanceRegistry::new(ctx.clone()));
        registry.start().await;

        let scheduler = if settings.jobs.enabled {
            match start_scheduler(&ctx, &registry, jobs, &settings).await {
                Ok(scheduler) => Some(scheduler),
                Err(e) => {
                    registry.shutdown().await;
                    store.shutdown().await;
                    return Err(e);
                }
            }
        } else {
            tracing::info!("Job scheduling disabled");
            None
        };

        tracing::info!(instance_id = %ctx.instance_id(), "Node started");

        Ok(RunningNode {
            ctx,
            registry,
            scheduler,
            store,
        })
    }

    /// Run until Ctrl+C or SIGTERM.
    pub async fn run(self) -> AppResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` resolves, then stop gracefully.
    pub async fn run_until<F>(self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        let node = self.start().await?;
        shutdown.await;
        node.shutdown().await;
        Ok(())
    }

    /// Read the fleet from the store without joining it.
    pub async fn status(&self) -> AppResult<FleetStatus> {
        let store = StoreManager::new(self.settings.store.clone())
            .await
            .map_err(|e| AppError::store("connect", e))?;

        let result = fleet_status(&store, &self.settings).await;
        store.shutdown().await;
        result
    }
}

async fn connect_store(settings: &Settings) -> StoreManager {
    match StoreManager::new(settings.store.clone()).await {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(
                error = %e,
                backend = ?settings.store.backend,
                "Coordination store setup failed, running without coordination"
            );
            StoreManager::from_backend(Arc::new(UnavailableStore::new()), settings.store.clone())
        }
    }
}

async fn start_scheduler(
    ctx: &CoordinationContext,
    registry: &Arc<InstanceRegistry>,
    jobs: JobRegistry,
    settings: &Settings,
) -> AppResult<JobScheduler> {
    let plan = plan_jobs(jobs, &settings.jobs);
    let executor = JobExecutor::new(
        ctx.clone(),
        Arc::clone(registry),
        ExecutorSettings::from_config(&settings.jobs, &settings.coordination),
    );

    let scheduler = JobScheduler::new(executor, plan.definitions).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

async fn fleet_status(store: &StoreManager, settings: &Settings) -> AppResult<FleetStatus> {
    if !store.backend().is_available() {
        return Err(AppError::store("read fleet", crate::store::StoreError::Unavailable));
    }

    // Never started, so it only reads
    let observer = InstanceRegistry::new(CoordinationContext::new(
        store.backend(),
        &settings.application.project,
        settings.coordination.clone(),
        InstanceIdentity::with_id(format!("status-{}", uuid::Uuid::new_v4())),
    ));

    let instances = observer
        .get_all_instances()
        .await
        .map_err(|e| AppError::store("list instances", e))?;
    let leader = observer
        .leader_id()
        .await
        .map_err(|e| AppError::store("read leader", e))?;

    Ok(FleetStatus {
        project: settings.application.project.clone(),
        leader,
        instances,
    })
}

/// A started node. Dropping it without [`RunningNode::shutdown`] leaves the
/// heartbeat record to expire on its own.
pub struct RunningNode {
    ctx: CoordinationContext,
    registry: Arc<InstanceRegistry>,
    scheduler: Option<JobScheduler>,
    store: StoreManager,
}

impl RunningNode {
    pub fn context(&self) -> &CoordinationContext {
        &self.ctx
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> Option<&JobScheduler> {
        self.scheduler.as_ref()
    }

    /// Stop the scheduler, then the registry, then the store.
    pub async fn shutdown(self) {
        tracing::info!(instance_id = %self.ctx.instance_id(), "Node shutting down");

        if let Some(scheduler) = &self.scheduler
            && let Err(e) = scheduler.stop().await
        {
            tracing::warn!(error = %e, "Job scheduler did not stop cleanly");
        }

        self.registry.shutdown().await;
        self.store.shutdown().await;

        tracing::info!("Node shutdown complete");
    }
}

/// Waits for Ctrl+C or SIGTERM.
///
/// A handler that cannot be installed is logged and never fires; the other
/// signal still works.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
