//! Worker runner: the poll, claim and execute loop.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{Instrument, debug, error, info, info_span, warn};

use ironrelay_core::config::WorkerConfig;
use ironrelay_core::error::AppError;
use ironrelay_core::traits::Clock;
use ironrelay_core::types::JobId;
use ironrelay_database::JobStore;
use ironrelay_entity::job::Job;

use crate::registry::{JobExecutionError, JobRegistry};
use crate::retry::{RetryDecision, RetryPolicy};

/// Tries at persisting a job's outcome before giving up on it.
const SAVE_ATTEMPTS: u32 = 3;

/// A single claim loop. Runs at most one job at a time.
#[derive(Debug, Clone)]
pub struct WorkerRunner {
    worker_id: String,
    jobs: Arc<dyn JobStore>,
    registry: Arc<JobRegistry>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    poll_interval: Duration,
    idle_pause: Duration,
}

impl WorkerRunner {
    pub fn new(
        worker_id: impl Into<String>,
        jobs: Arc<dyn JobStore>,
        registry: Arc<JobRegistry>,
        clock: Arc<dyn Clock>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            jobs,
            registry,
            clock,
            retry: RetryPolicy::from_config(config),
            poll_interval: config.poll_interval(),
            idle_pause: config.idle_pause(),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Run until the shutdown signal flips to `true`.
    ///
    /// A job that is already executing is allowed to finish.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Worker '{}' started with poll_interval={:?}, retry_delay={}s",
            self.worker_id,
            self.poll_interval,
            self.retry.delay().num_seconds()
        );

        while !*shutdown.borrow() {
            let pause = match self.run_once().await {
                Ok(Some(_)) => self.idle_pause,
                Ok(None) => self.poll_interval,
                Err(e) if e.is_store_error() => {
                    warn!(worker = %self.worker_id, error = %e, "Job store unavailable, retrying");
                    self.poll_interval
                }
                Err(e) => {
                    error!(worker = %self.worker_id, error = %e, "Worker iteration failed");
                    self.poll_interval
                }
            };

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = time::sleep(pause) => {}
            }
        }

        info!("Worker '{}' shut down", self.worker_id);
    }

    /// Poll once, claim the best eligible job and execute it.
    ///
    /// Returns the id of the executed job, or `None` if nothing was
    /// claimable. A claim lost to another worker triggers an immediate
    /// reselect rather than a sleep.
    pub async fn run_once(&self) -> Result<Option<JobId>, AppError> {
        loop {
            let now = self.clock.now();
            let Some(candidate) = self.jobs.find_next_claimable(now).await? else {
                return Ok(None);
            };

            match self.jobs.claim(candidate.id, &self.worker_id, now).await? {
                Some(job) => {
                    let id = job.id;
                    self.execute(job).await?;
                    return Ok(Some(id));
                }
                None => {
                    debug!(worker = %self.worker_id, job.id = %candidate.id, "Lost claim race");
                }
            }
        }
    }

    async fn execute(&self, mut job: Job) -> Result<(), AppError> {
        let span = info_span!(
            "job",
            job.id = %job.id,
            job.name = %job.name,
            worker = %self.worker_id
        );

        let outcome = self.invoke(&job).instrument(span.clone()).await;

        let now = self.clock.now();
        span.in_scope(|| self.resolve(&mut job, outcome, now));

        self.persist(&job).instrument(span).await
    }

    /// Save the job's outcome, retrying transient store errors.
    ///
    /// If every try fails the job is left `running` in the store.
    async fn persist(&self, job: &Job) -> Result<(), AppError> {
        let mut attempt = 1;
        loop {
            match self.jobs.save(job).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_store_error() && attempt < SAVE_ATTEMPTS => {
                    warn!(attempt, error = %e, "Failed to save job outcome, retrying");
                    time::sleep(self.poll_interval).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        job.id = %job.id,
                        outcome = %job.status,
                        error = %e,
                        "Failed to save job outcome; job is stuck in running"
                    );
                    return Err(e);
                }
            }
        }
    }

    fn resolve(
        &self,
        job: &mut Job,
        outcome: Result<(), JobExecutionError>,
        now: DateTime<Utc>,
    ) {
        match outcome {
            Ok(()) => {
                job.mark_succeeded(now);
                info!(attempt = job.attempts + 1, "Job succeeded");
            }
            Err(err) => {
                job.record_failure(err.to_string(), now);
                match self.retry.decide(job.attempts, job.max_attempts, now) {
                    RetryDecision::Reschedule { at } => {
                        job.reschedule(at, now);
                        warn!(
                            attempts = job.attempts,
                            max_attempts = job.max_attempts,
                            retry_at = %at,
                            error = %err,
                            "Job failed, will retry"
                        );
                    }
                    RetryDecision::Exhausted => {
                        job.mark_failed(now);
                        error!(
                            attempts = job.attempts,
                            error = %err,
                            "Job failed permanently"
                        );
                    }
                }
            }
        }
    }

    async fn invoke(&self, job: &Job) -> Result<(), JobExecutionError> {
        let handler = self.registry.resolve(&job.name)?;
        debug!(
            attempt = job.attempts + 1,
            max_attempts = job.max_attempts,
            "Running job"
        );

        AssertUnwindSafe(handler.execute(&job.payload))
            .catch_unwind()
            .await
            .map_err(|panic| {
                JobExecutionError::handler(format!("Handler panicked: {}", panic_message(&*panic)))
            })?
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A set of [`WorkerRunner`]s sharing one shutdown signal.
#[derive(Debug)]
pub struct WorkerPool {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    worker_ids: Vec<String>,
}

impl WorkerPool {
    /// Spawn `config.concurrency` runners named `{id_prefix}-{n}`.
    pub fn spawn(
        config: &WorkerConfig,
        jobs: Arc<dyn JobStore>,
        registry: Arc<JobRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let count = config.concurrency.max(1);
        let mut handles = Vec::with_capacity(count);
        let mut worker_ids = Vec::with_capacity(count);

        for n in 1..=count {
            let runner = WorkerRunner::new(
                format!("{}-{n}", config.id_prefix),
                Arc::clone(&jobs),
                Arc::clone(&registry),
                Arc::clone(&clock),
                config,
            );
            worker_ids.push(runner.worker_id().to_string());
            let rx = rx.clone();
            handles.push(tokio::spawn(async move { runner.run(rx).await }));
        }

        info!(workers = count, "Worker pool started");
        Self {
            shutdown,
            handles,
            worker_ids,
        }
    }

    pub fn worker_ids(&self) -> &[String] {
        &self.worker_ids
    }

    /// Stop claiming new jobs and wait for in-flight ones to finish.
    pub async fn shutdown(self) {
        info!("Worker pool waiting for in-flight jobs to complete...");
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task ended abnormally");
            }
        }
        info!("Worker pool shut down complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use ironrelay_core::result::AppResult;
    use ironrelay_core::traits::ManualClock;
    use ironrelay_database::{MemoryStore, Stores};
    use ironrelay_entity::job::{JobPayload, JobStatus, NewJob};

    use crate::queue::{JobQueue, JobRequest};
    use crate::registry::Task;

    struct Harness {
        queue: JobQueue,
        clock: Arc<ManualClock>,
        registry: Arc<JobRegistry>,
    }

    impl Harness {
        fn new(registry: JobRegistry) -> Self {
            let clock = Arc::new(ManualClock::new(Utc::now()));
            let queue = JobQueue::new(Stores::memory(MemoryStore::new()), clock.clone(), 5);
            Self {
                queue,
                clock,
                registry: Arc::new(registry),
            }
        }

        fn runner(&self, id: &str) -> WorkerRunner {
            WorkerRunner::new(
                id,
                Arc::clone(&self.queue.stores().jobs),
                Arc::clone(&self.registry),
                self.clock.clone(),
                &WorkerConfig::default(),
            )
        }

        async fn job(&self, id: JobId) -> Job {
            self.queue.find(id).await.unwrap().expect("job exists")
        }
    }

    /// Job store whose polls and saves fail a set number of times before
    /// reaching the wrapped store.
    #[derive(Debug)]
    struct FlakyJobs {
        inner: Arc<dyn JobStore>,
        poll_failures: AtomicUsize,
        save_failures: AtomicUsize,
    }

    impl FlakyJobs {
        fn new(inner: Arc<dyn JobStore>, poll_failures: usize, save_failures: usize) -> Self {
            Self {
                inner,
                poll_failures: AtomicUsize::new(poll_failures),
                save_failures: AtomicUsize::new(save_failures),
            }
        }

        fn trip(counter: &AtomicUsize) -> AppResult<()> {
            let tripped = counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if tripped {
                Err(AppError::database("connection reset"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl JobStore for FlakyJobs {
        async fn insert(&self, job: NewJob, now: DateTime<Utc>) -> AppResult<Job> {
            self.inner.insert(job, now).await
        }

        async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>> {
            self.inner.find_by_id(id).await
        }

        async fn find_next_claimable(&self, now: DateTime<Utc>) -> AppResult<Option<Job>> {
            Self::trip(&self.poll_failures)?;
            self.inner.find_next_claimable(now).await
        }

        async fn claim(&self, id: JobId, worker: &str, now: DateTime<Utc>) -> AppResult<Option<Job>> {
            self.inner.claim(id, worker, now).await
        }

        async fn save(&self, job: &Job) -> AppResult<()> {
            Self::trip(&self.save_failures)?;
            self.inner.save(job).await
        }

        async fn list(&self, status: Option<JobStatus>, limit: i64) -> AppResult<Vec<Job>> {
            self.inner.list(status, limit).await
        }

        async fn count_by_status(&self, status: JobStatus) -> AppResult<i64> {
            self.inner.count_by_status(status).await
        }

        async fn count(&self) -> AppResult<i64> {
            self.inner.count().await
        }

        async fn reset_failed(&self, ids: Option<&[JobId]>, now: DateTime<Utc>) -> AppResult<u64> {
            self.inner.reset_failed(ids, now).await
        }

        async fn cancel(&self, id: JobId, now: DateTime<Utc>) -> AppResult<bool> {
            self.inner.cancel(id, now).await
        }
    }

    fn fast_config() -> WorkerConfig {
        WorkerConfig {
            poll_interval_ms: 5,
            idle_pause_ms: 0,
            ..WorkerConfig::default()
        }
    }

    async fn succeed(_: JobPayload) -> Result<(), JobExecutionError> {
        Ok(())
    }

    async fn fail(_: JobPayload) -> Result<(), JobExecutionError> {
        Err(JobExecutionError::handler("boom"))
    }

    async fn explode(_: JobPayload) -> Result<(), JobExecutionError> {
        panic!("kaboom")
    }

    fn registry() -> JobRegistry {
        let mut registry = JobRegistry::new();
        registry.register(crate::task!(succeed)).unwrap();
        registry.register(crate::task!(fail)).unwrap();
        registry.register(crate::task!(explode)).unwrap();
        registry
    }

    fn name(handler: &str) -> String {
        format!("{}::{handler}", module_path!())
    }

    #[tokio::test]
    async fn test_success_marks_job_success() {
        let h = Harness::new(registry());
        let job = h.queue.enqueue(JobRequest::new(name("succeed"))).await.unwrap();

        let ran = h.runner("local-worker-1").run_once().await.unwrap();
        assert_eq!(ran, Some(job.id));

        let job = h.job(job.id).await;
        assert_eq!(job.status, JobStatus::Success);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.locked_by, "local-worker-1");
        assert!(job.locked_at.is_some());
    }

    #[tokio::test]
    async fn test_failure_reschedules_after_fixed_delay() {
        let h = Harness::new(registry());
        let job = h.queue.enqueue(JobRequest::new(name("fail"))).await.unwrap();
        let failed_at = h.clock.now();

        h.runner("w-1").run_once().await.unwrap();

        let job = h.job(job.id).await;
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.last_error, "boom");
        assert_eq!(job.scheduled_at, failed_at + ChronoDuration::seconds(3));
        assert_eq!(job.locked_by, "w-1");
        assert_eq!(job.locked_at, Some(failed_at));

        // Not eligible until the delay has passed.
        assert_eq!(h.runner("w-1").run_once().await.unwrap(), None);
        h.clock.advance(ChronoDuration::seconds(3));
        assert_eq!(h.runner("w-1").run_once().await.unwrap(), Some(job.id));
    }

    #[tokio::test]
    async fn test_exhausted_job_is_failed_not_pending() {
        let h = Harness::new(registry());
        let job = h
            .queue
            .enqueue(JobRequest::new(name("fail")).max_attempts(2))
            .await
            .unwrap();
        let runner = h.runner("w-1");

        runner.run_once().await.unwrap();
        h.clock.advance(ChronoDuration::seconds(3));
        runner.run_once().await.unwrap();

        let job = h.job(job.id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 2);

        h.clock.advance(ChronoDuration::minutes(10));
        assert_eq!(runner.run_once().await.unwrap(), None);
        assert_eq!(h.job(job.id).await.attempts, 2);
    }

    #[tokio::test]
    async fn test_unknown_handler_counts_as_failure() {
        let h = Harness::new(registry());
        let job = h
            .queue
            .enqueue(JobRequest::new("nowhere::missing").max_attempts(1))
            .await
            .unwrap();

        h.runner("w-1").run_once().await.unwrap();

        let job = h.job(job.id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 1);
        assert_eq!(
            job.last_error,
            "No handler registered for job 'nowhere::missing'"
        );
    }

    #[tokio::test]
    async fn test_panicking_handler_is_a_failure() {
        let h = Harness::new(registry());
        let job = h.queue.enqueue(JobRequest::new(name("explode"))).await.unwrap();

        h.runner("w-1").run_once().await.unwrap();

        let job = h.job(job.id).await;
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.last_error, "Handler panicked: kaboom");
    }

    #[tokio::test]
    async fn test_priority_then_schedule_order() {
        let h = Harness::new(registry());
        let low = h
            .queue
            .enqueue(JobRequest::new(name("succeed")).priority(1))
            .await
            .unwrap();
        let high = h
            .queue
            .enqueue(JobRequest::new(name("succeed")).priority(5))
            .await
            .unwrap();
        let future_top = h
            .queue
            .enqueue(
                JobRequest::new(name("succeed"))
                    .priority(100)
                    .delay(ChronoDuration::seconds(10)),
            )
            .await
            .unwrap();
        let runner = h.runner("w-1");

        assert_eq!(runner.run_once().await.unwrap(), Some(high.id));
        assert_eq!(runner.run_once().await.unwrap(), Some(low.id));
        assert_eq!(runner.run_once().await.unwrap(), None);

        h.clock.advance(ChronoDuration::seconds(9));
        assert_eq!(runner.run_once().await.unwrap(), None);
        h.clock.advance(ChronoDuration::seconds(1));
        assert_eq!(runner.run_once().await.unwrap(), Some(future_top.id));
    }

    #[tokio::test]
    async fn test_admin_reset_makes_failed_job_runnable() {
        let h = Harness::new(registry());
        let job = h
            .queue
            .enqueue(JobRequest::new(name("fail")).max_attempts(1))
            .await
            .unwrap();
        h.runner("w-1").run_once().await.unwrap();
        assert_eq!(h.job(job.id).await.status, JobStatus::Failed);

        h.clock.advance(ChronoDuration::minutes(1));
        assert_eq!(h.queue.retry_failed(None).await.unwrap(), 1);

        let reset = h.job(job.id).await;
        assert_eq!(reset.status, JobStatus::Pending);
        assert_eq!(reset.attempts, 0);
        assert_eq!(reset.last_error, "");
        assert!(reset.scheduled_at <= h.clock.now());
        assert_eq!(h.runner("w-1").run_once().await.unwrap(), Some(job.id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_workers_execute_each_job_once() {
        const JOBS: usize = 40;
        let executions: Arc<Mutex<HashMap<i64, usize>>> = Arc::default();

        let mut registry = JobRegistry::new();
        let seen = Arc::clone(&executions);
        registry
            .register(Task::from_fn("tests::count", move |payload: JobPayload| {
                let seen = Arc::clone(&seen);
                async move {
                    let n = payload.arg(0).and_then(|v| v.as_i64()).unwrap_or(-1);
                    *seen.lock().unwrap().entry(n).or_default() += 1;
                    tokio::task::yield_now().await;
                    Ok(())
                }
            }))
            .unwrap();

        let h = Harness::new(registry);
        for n in 0..JOBS {
            h.queue
                .enqueue(JobRequest::new("tests::count").arg(n as i64).max_attempts(1))
                .await
                .unwrap();
        }

        let config = WorkerConfig {
            concurrency: 6,
            poll_interval_ms: 5,
            idle_pause_ms: 0,
            ..WorkerConfig::default()
        };
        let pool = WorkerPool::spawn(
            &config,
            Arc::clone(&h.queue.stores().jobs),
            Arc::clone(&h.registry),
            h.clock.clone(),
        );
        assert_eq!(pool.worker_ids().len(), 6);
        assert_eq!(pool.worker_ids()[0], "local-worker-1");

        let done = async {
            loop {
                let stats = h.queue.stats().await.unwrap();
                if stats.success_jobs == JOBS as i64 {
                    break;
                }
                time::sleep(Duration::from_millis(10)).await;
            }
        };
        time::timeout(Duration::from_secs(10), done)
            .await
            .expect("all jobs finish");
        pool.shutdown().await;

        let executions = executions.lock().unwrap();
        assert_eq!(executions.len(), JOBS);
        assert!(executions.values().all(|&count| count == 1));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let h = Harness::new(registry());
        let runner = h.runner("w-1");
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { runner.run(rx).await });
        tx.send(true).unwrap();
        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("runner stops")
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_survives_store_outage() {
        let h = Harness::new(registry());
        let job = h.queue.enqueue(JobRequest::new(name("succeed"))).await.unwrap();
        let flaky = Arc::new(FlakyJobs::new(Arc::clone(&h.queue.stores().jobs), 3, 0));
        let runner = WorkerRunner::new(
            "w-1",
            flaky.clone(),
            Arc::clone(&h.registry),
            h.clock.clone(),
            &fast_config(),
        );
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { runner.run(rx).await });

        let done = async {
            while h.job(job.id).await.status != JobStatus::Success {
                time::sleep(Duration::from_millis(5)).await;
            }
        };
        time::timeout(Duration::from_secs(5), done)
            .await
            .expect("job runs once the store recovers");
        assert_eq!(flaky.poll_failures.load(Ordering::SeqCst), 0);

        tx.send(true).unwrap();
        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("runner stops")
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_once_surfaces_poll_error() {
        let h = Harness::new(registry());
        let flaky = FlakyJobs::new(Arc::clone(&h.queue.stores().jobs), 1, 0);
        let runner = WorkerRunner::new(
            "w-1",
            Arc::new(flaky),
            Arc::clone(&h.registry),
            h.clock.clone(),
            &fast_config(),
        );
        let err = runner.run_once().await.unwrap_err();
        assert!(err.is_store_error());
        assert_eq!(runner.run_once().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_outcome_save_is_retried() {
        let h = Harness::new(registry());
        let job = h.queue.enqueue(JobRequest::new(name("succeed"))).await.unwrap();
        let flaky = FlakyJobs::new(Arc::clone(&h.queue.stores().jobs), 0, SAVE_ATTEMPTS as usize - 1);
        let runner = WorkerRunner::new(
            "w-1",
            Arc::new(flaky),
            Arc::clone(&h.registry),
            h.clock.clone(),
            &fast_config(),
        );

        assert_eq!(runner.run_once().await.unwrap(), Some(job.id));
        assert_eq!(h.job(job.id).await.status, JobStatus::Success);
    }

    #[tokio::test]
    async fn test_outcome_save_gives_up_after_bounded_tries() {
        let h = Harness::new(registry());
        let job = h.queue.enqueue(JobRequest::new(name("succeed"))).await.unwrap();
        let flaky = FlakyJobs::new(Arc::clone(&h.queue.stores().jobs), 0, SAVE_ATTEMPTS as usize);
        let runner = WorkerRunner::new(
            "w-1",
            Arc::new(flaky),
            Arc::clone(&h.registry),
            h.clock.clone(),
            &fast_config(),
        );

        let err = runner.run_once().await.unwrap_err();
        assert!(err.is_store_error());
        assert_eq!(h.job(job.id).await.status, JobStatus::Running);
    }
}
