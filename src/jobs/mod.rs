//! Cron jobs that run on at most one instance per firing.

pub mod definition;
pub mod error;
pub mod executor;
pub mod registry;
pub mod scheduler;
pub mod tasks;
pub mod types;

pub use definition::{
    JobDefinition, JobUnit, job_name_from_source, normalize_schedule, validate_schedule,
};
pub use error::{JobError, JobResult};
pub use executor::{ConcurrencyTracker, ExecutorSettings, JobExecutor};
pub use registry::JobRegistry;
pub use scheduler::JobScheduler;
pub use types::{FiringOutcome, JobContext, JobStatus, JobTask};
