use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Invalid schedule '{expression}' for job {job}: {reason}")]
    InvalidSchedule {
        job: String,
        expression: String,
        reason: String,
    },

    #[error("Cannot derive a job name from '{0}'")]
    InvalidName(String),

    #[error("Lock TTL for job {0} must be greater than 0 milliseconds")]
    InvalidLockTtl(String),

    #[error("Job already exists: {0}")]
    AlreadyExists(String),

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("Job execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Job execution timeout after {0}s")]
    Timeout(u64),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<tokio_cron_scheduler::JobSchedulerError> for JobError {
    fn from(error: tokio_cron_scheduler::JobSchedulerError) -> Self {
        JobError::Scheduler(error.to_string())
    }
}

pub type JobResult<T> = Result<T, JobError>;
