use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::coordination::CoordinationContext;
use crate::error::AppResult;
use crate::instances::InstanceRegistry;

/// Job execution context passed to tasks
#[derive(Clone)]
pub struct JobContext {
    pub execution_id: Uuid,
    pub job_name: String,
    /// Second the scheduler fired at
    pub fire_time: Timestamp,
    pub coordination: CoordinationContext,
    pub registry: Arc<InstanceRegistry>,
    /// Cancelled when the firing times out
    pub cancellation_token: CancellationToken,
}

/// How a firing that held the lock ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Failed,
    Timeout,
    Panicked,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Success => write!(f, "success"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Timeout => write!(f, "timeout"),
            JobStatus::Panicked => write!(f, "panicked"),
        }
    }
}

/// Result of one scheduler firing on one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiringOutcome {
    /// This instance held the lock and ran the task
    Executed(JobStatus),
    /// Another instance holds the lock
    SkippedContended,
    /// The coordination store could not be reached
    SkippedStoreUnavailable,
    /// Leader-only job on a follower
    SkippedNotLeader,
    /// A previous firing of the job is still running on this instance
    SkippedAlreadyRunning,
}

impl FiringOutcome {
    pub fn executed(&self) -> bool {
        matches!(self, FiringOutcome::Executed(_))
    }
}

/// Trait that all job tasks must implement
#[async_trait]
pub trait JobTask: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this task type
    fn task_type() -> &'static str
    where
        Self: Sized;

    /// Execute the task
    async fn execute(&self, ctx: JobContext) -> AppResult<()>;

    /// Optional description
    fn description(&self) -> Option<String> {
        None
    }
}
