use std::sync::Arc;

use jiff::Timestamp;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler as TokioCronScheduler};

use crate::jobs::definition::{JobDefinition, normalize_schedule};
use crate::jobs::error::{JobError, JobResult};
use crate::jobs::executor::JobExecutor;
use crate::jobs::types::FiringOutcome;

/// Runs every loaded job on its cadence on this instance.
///
/// Every instance schedules every job; the executor's lock makes sure only
/// one of them actually runs a given firing.
pub struct JobScheduler {
    scheduler: Arc<Mutex<TokioCronScheduler>>,
    executor: Arc<JobExecutor>,
    definitions: Vec<Arc<JobDefinition>>,
}

impl JobScheduler {
    pub async fn new(executor: JobExecutor, definitions: Vec<JobDefinition>) -> JobResult<Self> {
        let scheduler = TokioCronScheduler::new().await?;

        Ok(Self {
            scheduler: Arc::new(Mutex::new(scheduler)),
            executor: Arc::new(executor),
            definitions: definitions.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.definitions.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn executor(&self) -> &Arc<JobExecutor> {
        &self.executor
    }

    /// Schedule all jobs and start ticking
    pub async fn start(&self) -> JobResult<()> {
        for definition in &self.definitions {
            self.schedule_job(Arc::clone(definition)).await?;
        }

        self.scheduler.lock().await.start().await?;
        tracing::info!(jobs = self.definitions.len(), "Job scheduler started");
        Ok(())
    }

    /// Stop the scheduler gracefully
    pub async fn stop(&self) -> JobResult<()> {
        self.scheduler.lock().await.shutdown().await?;
        tracing::info!("Job scheduler stopped");
        Ok(())
    }

    async fn schedule_job(&self, definition: Arc<JobDefinition>) -> JobResult<()> {
        let executor = Arc::clone(&self.executor);
        let job = Arc::clone(&definition);

        let schedule = normalize_schedule(&definition.schedule);
        let cron_job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
            let executor = Arc::clone(&executor);
            let job = Arc::clone(&job);

            Box::pin(async move {
                let now = Timestamp::now();
                let fire_time = Timestamp::from_second(now.as_second()).unwrap_or(now);

                match executor.fire(&job, fire_time).await {
                    FiringOutcome::Executed(status) => {
                        tracing::trace!(job = %job.name, status = %status, "Firing handled");
                    }
                    skipped => {
                        tracing::trace!(job = %job.name, outcome = ?skipped, "Firing skipped");
                    }
                }
            })
        })
        .map_err(|e| JobError::InvalidSchedule {
            job: definition.name.clone(),
            expression: definition.schedule.clone(),
            reason: e.to_string(),
        })?;

        self.scheduler.lock().await.add(cron_job).await?;
        Ok(())
    }
}
