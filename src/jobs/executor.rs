use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use jiff::Timestamp;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{CoordinationConfig, JobsConfig};
use crate::coordination::CoordinationContext;
use crate::instances::InstanceRegistry;
use crate::jobs::definition::JobDefinition;
use crate::jobs::types::{FiringOutcome, JobContext, JobStatus};
use crate::lock::LockManager;

/// Tracks jobs currently running on this instance
#[derive(Clone, Default)]
pub struct ConcurrencyTracker {
    running: Arc<DashSet<String>>,
}

impl ConcurrencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `job_name` as running; `None` if it already is. The job counts
    /// as running until the returned guard is dropped.
    pub fn try_begin(&self, job_name: &str) -> Option<RunningGuard> {
        if !self.running.insert(job_name.to_string()) {
            return None;
        }
        Some(RunningGuard {
            running: Arc::clone(&self.running),
            job_name: job_name.to_string(),
        })
    }

    pub fn is_running(&self, job_name: &str) -> bool {
        self.running.contains(job_name)
    }
}

/// Marks a job as running on this instance while alive
pub struct RunningGuard {
    running: Arc<DashSet<String>>,
    job_name: String,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.running.remove(&self.job_name);
    }
}

/// Firing parameters shared by every job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub job_timeout: Duration,
    pub lock_ttl_ms: u64,
    /// Bucket lock keys by fire second; such locks are left to expire
    pub lock_per_fire_time: bool,
}

impl ExecutorSettings {
    pub fn from_config(jobs: &JobsConfig, coordination: &CoordinationConfig) -> Self {
        Self {
            job_timeout: Duration::from_secs(jobs.job_timeout),
            lock_ttl_ms: jobs.lock_ttl_ms.unwrap_or(coordination.default_lock_ttl_ms),
            lock_per_fire_time: jobs.lock_per_fire_time,
        }
    }
}

/// Runs one firing of a job under its distributed lock
pub struct JobExecutor {
    ctx: CoordinationContext,
    locks: LockManager,
    registry: Arc<InstanceRegistry>,
    concurrency: ConcurrencyTracker,
    settings: ExecutorSettings,
}

impl JobExecutor {
    pub fn new(
        ctx: CoordinationContext,
        registry: Arc<InstanceRegistry>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            locks: LockManager::new(ctx.clone()),
            ctx,
            registry,
            concurrency: ConcurrencyTracker::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Lock key for one firing of `job`.
    pub fn lock_key(&self, job: &JobDefinition, fire_time: Timestamp) -> String {
        if self.settings.lock_per_fire_time {
            format!("{}-{}-lock", job.name, fire_time.as_second())
        } else {
            format!("{}-lock", job.name)
        }
    }

    /// Handle one scheduler firing. Never fails; the outcome says what
    /// happened.
    pub async fn fire(&self, job: &JobDefinition, fire_time: Timestamp) -> FiringOutcome {
        if job.leader_only && !self.registry.is_current_instance_master().await {
            tracing::debug!(job = %job.name, "Skipped, this instance is not the leader");
            return FiringOutcome::SkippedNotLeader;
        }

        let Some(_running) = self.concurrency.try_begin(&job.name) else {
            tracing::debug!(job = %job.name, "Skipped, previous firing still running here");
            return FiringOutcome::SkippedAlreadyRunning;
        };

        self.fire_locked(job, fire_time).await
    }

    async fn fire_locked(&self, job: &JobDefinition, fire_time: Timestamp) -> FiringOutcome {
        let store = self.ctx.store();
        if !store.is_available() {
            tracing::debug!(job = %job.name, "Skipped, coordination store unavailable");
            return FiringOutcome::SkippedStoreUnavailable;
        }

        let lock_key = self.lock_key(job, fire_time);
        let ttl_ms = job
            .lock_ttl_ms
            .filter(|ttl| *ttl > 0)
            .unwrap_or(self.settings.lock_ttl_ms);

        let Some(token) = self.locks.acquire(&lock_key, ttl_ms).await else {
            if !store.is_available() {
                tracing::debug!(job = %job.name, "Skipped, coordination store unavailable");
                return FiringOutcome::SkippedStoreUnavailable;
            }
            tracing::debug!(job = %job.name, lock_key = %lock_key, "Skipped, another instance holds the lock");
            return FiringOutcome::SkippedContended;
        };

        let status = self.run_task(job, fire_time).await;

        // Fire-time keys are unique to the tick; holding them until expiry
        // keeps late, clock-skewed instances from re-running it.
        if !self.settings.lock_per_fire_time {
            self.locks.release(&lock_key, &token).await;
        }

        FiringOutcome::Executed(status)
    }

    async fn run_task(&self, job: &JobDefinition, fire_time: Timestamp) -> JobStatus {
        let execution_id = Uuid::new_v4();
        let cancellation_token = CancellationToken::new();
        let ctx = JobContext {
            execution_id,
            job_name: job.name.clone(),
            fire_time,
            coordination: self.ctx.clone(),
            registry: Arc::clone(&self.registry),
            cancellation_token: cancellation_token.clone(),
        };

        tracing::debug!(job = %job.name, %execution_id, "Job started");
        let start_time = Instant::now();

        let task = Arc::clone(&job.task);
        let mut handle = tokio::spawn(async move { task.execute(ctx).await });

        let status = match tokio::time::timeout(self.settings.job_timeout, &mut handle).await {
            Ok(Ok(Ok(()))) => JobStatus::Success,
            Ok(Ok(Err(e))) => {
                tracing::error!(job = %job.name, %execution_id, error = %e, "Job failed");
                JobStatus::Failed
            }
            Ok(Err(e)) if e.is_panic() => {
                tracing::error!(job = %job.name, %execution_id, "Job panicked");
                JobStatus::Panicked
            }
            Ok(Err(e)) => {
                tracing::warn!(job = %job.name, %execution_id, error = %e, "Job task cancelled");
                JobStatus::Failed
            }
            Err(_) => {
                cancellation_token.cancel();
                handle.abort();
                // The lock must outlive the task, so wait for the abort to land
                if let Err(e) = handle.await
                    && e.is_panic()
                {
                    tracing::error!(job = %job.name, %execution_id, "Job panicked while being aborted");
                }
                tracing::warn!(
                    job = %job.name,
                    %execution_id,
                    timeout_secs = self.settings.job_timeout.as_secs(),
                    "Job timed out"
                );
                JobStatus::Timeout
            }
        };

        tracing::info!(
            job = %job.name,
            %execution_id,
            status = %status,
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Job finished"
        );
        status
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::coordination::testing;
    use crate::error::{AppError, AppResult};
    use crate::jobs::types::{JobContext, JobTask};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Copy)]
    pub(crate) enum Behaviour {
        Succeed,
        Fail,
        Panic,
    }

    /// Task that counts its runs and holds for a while before finishing.
    #[derive(Debug)]
    pub(crate) struct CountingTask {
        pub(crate) runs: Arc<AtomicUsize>,
        pub(crate) hold: Duration,
        pub(crate) behaviour: Behaviour,
    }

    impl CountingTask {
        pub(crate) fn new(hold: Duration) -> (Arc<Self>, Arc<AtomicUsize>) {
            Self::with_behaviour(hold, Behaviour::Succeed)
        }

        pub(crate) fn with_behaviour(hold: Duration, behaviour: Behaviour) -> (Arc<Self>, Arc<AtomicUsize>) {
            let runs = Arc::new(AtomicUsize::new(0));
            let task = Arc::new(Self {
                runs: runs.clone(),
                hold,
                behaviour,
            });
            (task, runs)
        }
    }

    #[async_trait]
    impl JobTask for CountingTask {
        fn task_type() -> &'static str {
            "counting"
        }

        async fn execute(&self, _ctx: JobContext) -> AppResult<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.hold).await;
            match self.behaviour {
                Behaviour::Succeed => Ok(()),
                Behaviour::Fail => Err(AppError::Internal {
                    source: anyhow::anyhow!("report generation failed"),
                }),
                Behaviour::Panic => panic!("task blew up"),
            }
        }
    }

    fn settings() -> ExecutorSettings {
        ExecutorSettings {
            job_timeout: Duration::from_secs(5),
            lock_ttl_ms: 30_000,
            lock_per_fire_time: false,
        }
    }

    fn executor(store: &Arc<MemoryStore>, id: &str, settings: ExecutorSettings) -> JobExecutor {
        let ctx = testing::context(store, id);
        let registry = Arc::new(InstanceRegistry::new(ctx.clone()));
        JobExecutor::new(ctx, registry, settings)
    }

    fn job(name: &str, task: Arc<dyn JobTask>) -> JobDefinition {
        JobDefinition {
            name: name.to_string(),
            schedule: "0 * * * * *".to_string(),
            task,
            leader_only: false,
            lock_ttl_ms: None,
        }
    }

    fn fire_time() -> Timestamp {
        "2024-05-01T03:00:00Z".parse().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_runs_once_per_tick() {
        let store = Arc::new(MemoryStore::new());
        let fleet: Vec<_> = (0..5).map(|i| executor(&store, &format!("node-{i}"), settings())).collect();
        let (task, runs) = CountingTask::new(Duration::from_millis(500));
        let job = job("nightly-report", task);

        let outcomes =
            futures::future::join_all(fleet.iter().map(|e| e.fire(&job, fire_time()))).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(outcomes.iter().filter(|o| o.executed()).count(), 1);
        assert_eq!(
            outcomes.iter().filter(|o| **o == FiringOutcome::SkippedContended).count(),
            4
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_job_lock_ttl_still_excludes_fleet() {
        let store = Arc::new(MemoryStore::new());
        let fleet: Vec<_> = (0..5).map(|i| executor(&store, &format!("node-{i}"), settings())).collect();
        let (task, runs) = CountingTask::new(Duration::from_millis(500));
        let job = JobDefinition {
            lock_ttl_ms: Some(0),
            ..job("nightly-report", task)
        };

        futures::future::join_all(fleet.iter().map(|e| e.fire(&job, fire_time()))).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_released_after_each_run() {
        let store = Arc::new(MemoryStore::new());
        let a = executor(&store, "a", settings());
        let b = executor(&store, "b", settings());
        let (task, runs) = CountingTask::new(Duration::from_millis(10));
        let job = job("report", task);

        assert_eq!(a.fire(&job, fire_time()).await, FiringOutcome::Executed(JobStatus::Success));
        assert_eq!(b.fire(&job, fire_time()).await, FiringOutcome::Executed(JobStatus::Success));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(!LockManager::new(testing::context(&store, "c")).is_locked("report-lock").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_and_panic_release_lock() {
        let store = Arc::new(MemoryStore::new());
        let a = executor(&store, "a", settings());
        let locks = LockManager::new(testing::context(&store, "a"));

        let (failing, _) = CountingTask::with_behaviour(Duration::ZERO, Behaviour::Fail);
        let failing = job("failing", failing);
        assert_eq!(a.fire(&failing, fire_time()).await, FiringOutcome::Executed(JobStatus::Failed));
        assert!(!locks.is_locked("failing-lock").await);

        let (panicking, _) = CountingTask::with_behaviour(Duration::ZERO, Behaviour::Panic);
        let panicking = job("panicking", panicking);
        assert_eq!(a.fire(&panicking, fire_time()).await, FiringOutcome::Executed(JobStatus::Panicked));
        assert!(!locks.is_locked("panicking-lock").await);

        // The executor keeps working after a panic
        assert_eq!(a.fire(&failing, fire_time()).await, FiringOutcome::Executed(JobStatus::Failed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_releases_lock() {
        let store = Arc::new(MemoryStore::new());
        let a = executor(
            &store,
            "a",
            ExecutorSettings {
                job_timeout: Duration::from_secs(1),
                ..settings()
            },
        );
        let (task, _) = CountingTask::new(Duration::from_secs(60));
        let job = job("slow", task);

        assert_eq!(a.fire(&job, fire_time()).await, FiringOutcome::Executed(JobStatus::Timeout));
        assert!(!LockManager::new(testing::context(&store, "a")).is_locked("slow-lock").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_firing_on_same_instance_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let a = executor(&store, "a", settings());
        let (task, runs) = CountingTask::new(Duration::from_secs(2));
        let job = job("report", task);

        let (first, second) = tokio::join!(a.fire(&job, fire_time()), a.fire(&job, fire_time()));
        assert_eq!(first, FiringOutcome::Executed(JobStatus::Success));
        assert_eq!(second, FiringOutcome::SkippedAlreadyRunning);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_leader_only_job() {
        let store = Arc::new(MemoryStore::new());
        let leader_ctx = testing::context(&store, "a");
        let leader_registry = Arc::new(InstanceRegistry::new(leader_ctx.clone()));
        leader_registry.tick().await;
        let leader = JobExecutor::new(leader_ctx, leader_registry, settings());

        let follower = executor(&store, "b", settings());
        let (task, runs) = CountingTask::new(Duration::ZERO);
        let job = JobDefinition {
            leader_only: true,
            ..job("fleet-summary", task)
        };

        assert_eq!(follower.fire(&job, fire_time()).await, FiringOutcome::SkippedNotLeader);
        assert_eq!(leader.fire(&job, fire_time()).await, FiringOutcome::Executed(JobStatus::Success));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_skips_firing() {
        let store = Arc::new(MemoryStore::new());
        let a = executor(&store, "a", settings());
        let (task, runs) = CountingTask::new(Duration::ZERO);
        let job = job("report", task);

        store.set_available(false);
        assert_eq!(a.fire(&job, fire_time()).await, FiringOutcome::SkippedStoreUnavailable);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_time_lock_dedupes_late_firings() {
        let store = Arc::new(MemoryStore::new());
        let per_tick = ExecutorSettings {
            lock_per_fire_time: true,
            ..settings()
        };
        let a = executor(&store, "a", per_tick.clone());
        let b = executor(&store, "b", per_tick);
        let (task, runs) = CountingTask::new(Duration::from_millis(10));
        let job = job("report", task);

        assert_eq!(a.lock_key(&job, fire_time()), format!("report-{}-lock", fire_time().as_second()));
        assert!(a.fire(&job, fire_time()).await.executed());
        assert_eq!(b.fire(&job, fire_time()).await, FiringOutcome::SkippedContended);

        let next_tick: Timestamp = "2024-05-01T03:01:00Z".parse().unwrap();
        assert!(b.fire(&job, next_tick).await.executed());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_settings_fall_back_to_default_lock_ttl() {
        let coordination = CoordinationConfig::default();
        let jobs = JobsConfig::default();
        let settings = ExecutorSettings::from_config(&jobs, &coordination);
        assert_eq!(settings.lock_ttl_ms, 120_000);
        assert_eq!(settings.job_timeout, Duration::from_secs(300));

        let jobs = JobsConfig {
            lock_ttl_ms: Some(5_000),
            ..JobsConfig::default()
        };
        assert_eq!(ExecutorSettings::from_config(&jobs, &coordination).lock_ttl_ms, 5_000);
    }

    #[test]
    fn test_concurrency_tracker() {
        let tracker = ConcurrencyTracker::new();
        let guard = tracker.try_begin("a").expect("not running yet");
        assert!(tracker.try_begin("a").is_none());
        assert!(tracker.is_running("a"));
        drop(guard);
        assert!(!tracker.is_running("a"));
        assert!(tracker.try_begin("a").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_firing_does_not_block_later_firings() {
        let store = Arc::new(MemoryStore::new());
        let a = Arc::new(executor(&store, "a", settings()));
        let (task, runs) = CountingTask::new(Duration::from_secs(2));
        let job = Arc::new(job("report", task));

        let firing = {
            let (a, job) = (Arc::clone(&a), Arc::clone(&job));
            tokio::spawn(async move { a.fire(&job, fire_time()).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        firing.abort();
        assert!(firing.await.unwrap_err().is_cancelled());
        assert!(!a.concurrency.is_running("report"));

        // The abandoned firing's lock has to expire before anyone runs again
        tokio::time::advance(Duration::from_millis(settings().lock_ttl_ms)).await;
        let next_tick: Timestamp = "2024-05-01T03:01:00Z".parse().unwrap();
        assert!(a.fire(&job, next_tick).await.executed());
    }

    /// Hangs until dropped, then records that it was.
    #[derive(Debug)]
    struct HangingTask {
        dropped: Arc<std::sync::atomic::AtomicBool>,
    }

    struct SetOnDrop(Arc<std::sync::atomic::AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl JobTask for HangingTask {
        fn task_type() -> &'static str {
            "hanging"
        }

        async fn execute(&self, _ctx: JobContext) -> AppResult<()> {
            let _flag = SetOnDrop(Arc::clone(&self.dropped));
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_task_is_gone_before_lock_release() {
        let store = Arc::new(MemoryStore::new());
        let a = executor(
            &store,
            "a",
            ExecutorSettings {
                job_timeout: Duration::from_secs(1),
                ..settings()
            },
        );
        let dropped = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let job = job(
            "stuck",
            Arc::new(HangingTask {
                dropped: Arc::clone(&dropped),
            }),
        );

        assert_eq!(a.fire(&job, fire_time()).await, FiringOutcome::Executed(JobStatus::Timeout));
        assert!(dropped.load(Ordering::SeqCst));
        assert!(!LockManager::new(testing::context(&store, "a")).is_locked("stuck-lock").await);
    }
}
