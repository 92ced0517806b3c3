use std::sync::Arc;

use tokio_cron_scheduler::Job;

use crate::jobs::error::{JobError, JobResult};
use crate::jobs::types::JobTask;

/// A loaded job. Immutable once registered.
#[derive(Debug, Clone)]
pub struct JobDefinition {
    pub name: String,
    /// Cron expression, seconds field first
    pub schedule: String,
    pub task: Arc<dyn JobTask>,
    pub leader_only: bool,
    /// Overrides the scheduler-wide lock TTL
    pub lock_ttl_ms: Option<u64>,
}

impl JobDefinition {
    /// Build a definition, rejecting schedules the cron parser does not accept.
    pub fn new(
        name: impl Into<String>,
        schedule: impl Into<String>,
        task: Arc<dyn JobTask>,
    ) -> JobResult<Self> {
        let name = name.into();
        let schedule = normalize_schedule(&schedule.into());
        if name.trim().is_empty() {
            return Err(JobError::InvalidName(name));
        }
        validate_schedule(&name, &schedule)?;

        Ok(Self {
            name,
            schedule,
            task,
            leader_only: false,
            lock_ttl_ms: None,
        })
    }

    pub fn leader_only(mut self, leader_only: bool) -> Self {
        self.leader_only = leader_only;
        self
    }

    /// Per-job lock TTL. A zero TTL would expire the lock as it is written.
    pub fn with_lock_ttl(mut self, lock_ttl_ms: Option<u64>) -> JobResult<Self> {
        if lock_ttl_ms == Some(0) {
            return Err(JobError::InvalidLockTtl(self.name));
        }
        self.lock_ttl_ms = lock_ttl_ms;
        Ok(self)
    }
}

/// A job contributed by code, named after its source identifier.
#[derive(Debug, Clone)]
pub struct JobUnit {
    /// Path-like identifier, e.g. `src/jobs/NightlyReport.rs`
    pub source: String,
    pub schedule: String,
    pub task: Arc<dyn JobTask>,
    pub leader_only: bool,
}

impl JobUnit {
    pub fn new(source: impl Into<String>, schedule: impl Into<String>, task: Arc<dyn JobTask>) -> Self {
        Self {
            source: source.into(),
            schedule: schedule.into(),
            task,
            leader_only: false,
        }
    }

    pub fn leader_only(mut self) -> Self {
        self.leader_only = true;
        self
    }

    pub fn into_definition(self) -> JobResult<JobDefinition> {
        let name = job_name_from_source(&self.source)?;
        Ok(JobDefinition::new(name, self.schedule, self.task)?.leader_only(self.leader_only))
    }
}

/// Job name from a source identifier: last path segment up to its first
/// `.`, lower-cased. `src/jobs/Cleanup.job.ts` names the job `cleanup`.
pub fn job_name_from_source(source: &str) -> JobResult<String> {
    let segment = source.rsplit(['/', '\\']).next().unwrap_or_default();
    let stem = segment.split('.').next().unwrap_or_default();

    if stem.trim().is_empty() {
        return Err(JobError::InvalidName(source.to_string()));
    }
    Ok(stem.to_lowercase())
}

/// Standard five-field expressions get a `0` seconds field; anything else
/// is passed through trimmed.
pub fn normalize_schedule(expression: &str) -> String {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() == 5 {
        format!("0 {}", fields.join(" "))
    } else {
        expression.trim().to_string()
    }
}

/// Check `expression` against the scheduler's cron grammar. Five-field
/// expressions are accepted and read as firing at second 0.
pub fn validate_schedule(job: &str, expression: &str) -> JobResult<()> {
    Job::new(normalize_schedule(expression).as_str(), |_uuid, _lock| {})
        .map(|_| ())
        .map_err(|e| JobError::InvalidSchedule {
            job: job.to_string(),
            expression: expression.to_string(),
            reason: e.to_string(),
        })
}
