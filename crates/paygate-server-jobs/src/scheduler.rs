// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::context::{CancellationToken, JobContext};
use crate::error::{JobError, Result};
use crate::job::Job;
use crate::types::{JobDefinition, JobRepository, JobRun, JobStatus, JobType, TriggerSource};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Exponential backoff applied between attempts of a retryable failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
	pub base_delay: Duration,
	pub factor: f64,
	pub max_delay: Duration,
	pub max_retries: u32,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			base_delay: Duration::from_secs(1),
			factor: 2.0,
			max_delay: Duration::from_secs(60),
			max_retries: 3,
		}
	}
}

impl RetryPolicy {
	/// Delay before retry number `retry_count` (1-based).
	pub fn delay(&self, retry_count: u32) -> Duration {
		let exponent = i32::try_from(retry_count.saturating_sub(1)).unwrap_or(i32::MAX);
		let secs = self.base_delay.as_secs_f64() * self.factor.powi(exponent);
		if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
			self.max_delay
		} else {
			Duration::from_secs_f64(secs.max(0.0))
		}
	}
}

struct RegisteredJob {
	job: Arc<dyn Job>,
	job_type: JobType,
	cancellation_token: CancellationToken,
}

pub struct JobScheduler {
	jobs: HashMap<String, RegisteredJob>,
	repository: Arc<JobRepository>,
	retry_policy: RetryPolicy,
	shutdown_tx: broadcast::Sender<()>,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl JobScheduler {
	pub fn new(repository: Arc<JobRepository>) -> Self {
		let (shutdown_tx, _) = broadcast::channel(1);
		Self {
			jobs: HashMap::new(),
			repository,
			retry_policy: RetryPolicy::default(),
			shutdown_tx,
			handles: Mutex::new(Vec::new()),
		}
	}

	pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
		self.retry_policy = retry_policy;
		self
	}

	pub fn register_periodic(&mut self, job: Arc<dyn Job>, interval: Duration) {
		self.register(job, JobType::Periodic { interval });
	}

	pub fn register_one_shot(&mut self, job: Arc<dyn Job>) {
		self.register(job, JobType::OneShot);
	}

	fn register(&mut self, job: Arc<dyn Job>, job_type: JobType) {
		let id = job.id().to_string();
		if self.jobs.contains_key(&id) {
			warn!(job_id = %id, "Replacing already registered job");
		}
		self.jobs.insert(
			id,
			RegisteredJob {
				job,
				job_type,
				cancellation_token: CancellationToken::new(),
			},
		);
	}

	/// Persist a definition row for every registered job.
	#[instrument(skip(self))]
	pub async fn sync_definitions(&self) -> Result<()> {
		for (job_id, registered) in &self.jobs {
			let def = JobDefinition {
				id: job_id.clone(),
				name: registered.job.name().to_string(),
				description: registered.job.description().to_string(),
				job_type: registered.job_type.as_str().to_string(),
				interval_secs: registered.job_type.interval_secs(),
				enabled: true,
			};
			self.repository.upsert_definition(&def).await?;
		}
		Ok(())
	}

	/// Upsert definitions and spawn one loop per periodic job. The first run
	/// happens one interval after start.
	#[instrument(skip(self))]
	pub async fn start(&self) -> Result<()> {
		self.sync_definitions().await?;

		let mut handles = self.handles.lock().await;
		for (job_id, registered) in &self.jobs {
			let JobType::Periodic { interval } = registered.job_type else {
				continue;
			};

			let job = Arc::clone(&registered.job);
			let repository = Arc::clone(&self.repository);
			let mut shutdown_rx = self.shutdown_tx.subscribe();
			let cancellation_token = registered.cancellation_token.clone();
			let retry_policy = self.retry_policy;
			let job_id = job_id.clone();

			let handle = tokio::spawn(async move {
				loop {
					tokio::select! {
						_ = tokio::time::sleep(interval) => {
							if cancellation_token.is_cancelled() {
								continue;
							}
							if let Err(e) = run_job_with_retry(
								&job,
								&repository,
								TriggerSource::Schedule,
								&cancellation_token,
								&retry_policy,
							)
							.await
							{
								warn!(job_id = %job_id, error = %e, "Scheduled run did not succeed");
							}
						}
						_ = shutdown_rx.recv() => {
							info!(job_id = %job_id, "Shutting down periodic job");
							break;
						}
					}
				}
			});

			handles.push(handle);
		}

		info!(job_count = self.jobs.len(), periodic = handles.len(), "Job scheduler started");
		Ok(())
	}

	/// Run a job now and wait for it, retries included. Returns the id of the
	/// last recorded run.
	#[instrument(skip(self))]
	pub async fn trigger(&self, job_id: &str, triggered_by: TriggerSource) -> Result<String> {
		let registered = self
			.jobs
			.get(job_id)
			.ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

		run_job_with_retry(
			&registered.job,
			&self.repository,
			triggered_by,
			&registered.cancellation_token,
			&self.retry_policy,
		)
		.await
	}

	#[instrument(skip(self))]
	pub async fn cancel_job(&self, job_id: &str) -> Result<()> {
		let registered = self
			.jobs
			.get(job_id)
			.ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

		registered.cancellation_token.cancel();
		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		let _ = self.shutdown_tx.send(());

		let mut handles = self.handles.lock().await;
		for handle in handles.drain(..) {
			let _ = handle.await;
		}

		info!("Job scheduler shut down");
	}

	/// Registered job ids, sorted.
	pub fn job_ids(&self) -> Vec<String> {
		let mut ids: Vec<String> = self.jobs.keys().cloned().collect();
		ids.sort();
		ids
	}
}

async fn run_job_with_retry(
	job: &Arc<dyn Job>,
	repository: &JobRepository,
	triggered_by: TriggerSource,
	cancellation_token: &CancellationToken,
	retry_policy: &RetryPolicy,
) -> Result<String> {
	let mut attempt = 0u32;

	loop {
		let run_id = uuid::Uuid::new_v4().to_string();
		let ctx = JobContext {
			run_id: run_id.clone(),
			triggered_by: if attempt > 0 {
				TriggerSource::Retry
			} else {
				triggered_by
			},
			attempt,
			cancellation_token: cancellation_token.clone(),
		};

		repository
			.record_run_start(&JobRun {
				id: run_id.clone(),
				job_id: job.id().to_string(),
				status: JobStatus::Running,
				started_at: Utc::now(),
				completed_at: None,
				duration_ms: None,
				error_message: None,
				retry_count: attempt,
				triggered_by: ctx.triggered_by,
				metadata: None,
			})
			.await?;

		match job.run(&ctx).await {
			Ok(output) => {
				repository
					.record_run_complete(&run_id, JobStatus::Succeeded, None, output.metadata)
					.await?;
				info!(job_id = %job.id(), run_id = %run_id, message = %output.message, "Job completed successfully");
				return Ok(run_id);
			}
			Err(JobError::Cancelled) => {
				repository
					.record_run_complete(&run_id, JobStatus::Cancelled, None, None)
					.await?;
				info!(job_id = %job.id(), run_id = %run_id, "Job cancelled");
				return Err(JobError::Cancelled);
			}
			Err(JobError::Failed { message, retryable }) => {
				repository
					.record_run_complete(&run_id, JobStatus::Failed, Some(message.clone()), None)
					.await?;

				if retryable && attempt < retry_policy.max_retries && !cancellation_token.is_cancelled() {
					attempt += 1;
					let delay = retry_policy.delay(attempt);
					warn!(
						job_id = %job.id(),
						run_id = %run_id,
						attempt,
						delay_ms = delay.as_millis() as u64,
						error = %message,
						"Job failed, retrying"
					);
					tokio::time::sleep(delay).await;
					continue;
				}

				warn!(job_id = %job.id(), run_id = %run_id, error = %message, "Job failed");
				return Err(JobError::Failed { message, retryable });
			}
			Err(e) => {
				let message = e.to_string();
				repository
					.record_run_complete(&run_id, JobStatus::Failed, Some(message.clone()), None)
					.await?;
				warn!(job_id = %job.id(), run_id = %run_id, error = %message, "Job failed with error");
				return Err(e);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::JobOutput;
	use async_trait::async_trait;
	use paygate_server_db::testing::create_test_pool;
	use std::sync::atomic::{AtomicU32, Ordering};

	fn fast_retries() -> RetryPolicy {
		RetryPolicy {
			base_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(5),
			..RetryPolicy::default()
		}
	}

	async fn setup() -> (JobScheduler, Arc<JobRepository>) {
		let repository = Arc::new(JobRepository::new(create_test_pool().await));
		let scheduler = JobScheduler::new(Arc::clone(&repository)).with_retry_policy(fast_retries());
		(scheduler, repository)
	}

	/// Fails for the first `failures` attempts, then succeeds.
	struct MockJob {
		id: String,
		failures: u32,
		retryable: bool,
		calls: AtomicU32,
	}

	impl MockJob {
		fn ok(id: &str) -> Self {
			Self::failing(id, 0, true)
		}

		fn failing(id: &str, failures: u32, retryable: bool) -> Self {
			Self {
				id: id.to_string(),
				failures,
				retryable,
				calls: AtomicU32::new(0),
			}
		}
	}

	#[async_trait]
	impl Job for MockJob {
		fn id(&self) -> &str {
			&self.id
		}

		fn name(&self) -> &str {
			"Mock"
		}

		fn description(&self) -> &str {
			"A mock job for testing"
		}

		async fn run(&self, ctx: &JobContext) -> std::result::Result<JobOutput, JobError> {
			if ctx.is_cancelled() {
				return Err(JobError::Cancelled);
			}
			let call = self.calls.fetch_add(1, Ordering::SeqCst);
			if call < self.failures {
				return Err(JobError::Failed {
					message: format!("attempt {call} failed"),
					retryable: self.retryable,
				});
			}
			Ok(JobOutput::new("done").with_metadata(serde_json::json!({"attempt": ctx.attempt})))
		}
	}

	async fn runs_by_attempt(repository: &JobRepository, job_id: &str) -> Vec<JobRun> {
		let mut runs = repository.list_runs(job_id, 100, 0).await.unwrap();
		runs.sort_by_key(|r| r.retry_count);
		runs
	}

	#[test]
	fn test_backoff_delays() {
		let policy = RetryPolicy::default();
		assert_eq!(policy.delay(1), Duration::from_secs(1));
		assert_eq!(policy.delay(2), Duration::from_secs(2));
		assert_eq!(policy.delay(3), Duration::from_secs(4));
		assert_eq!(policy.delay(7), Duration::from_secs(60));
		assert_eq!(policy.delay(u32::MAX), Duration::from_secs(60));
	}

	#[tokio::test]
	async fn test_start_persists_definitions() {
		let (mut scheduler, repository) = setup().await;
		scheduler.register_periodic(Arc::new(MockJob::ok("expiry")), Duration::from_secs(3600));
		scheduler.register_one_shot(Arc::new(MockJob::ok("backfill")));
		scheduler.start().await.unwrap();

		let defs = repository.list_definitions().await.unwrap();
		assert_eq!(defs.len(), 2);
		let expiry = defs.iter().find(|d| d.id == "expiry").unwrap();
		assert_eq!(expiry.job_type, "periodic");
		assert_eq!(expiry.interval_secs, Some(3600));
		let backfill = defs.iter().find(|d| d.id == "backfill").unwrap();
		assert_eq!(backfill.job_type, "one_shot");
		assert_eq!(backfill.interval_secs, None);
		assert_eq!(scheduler.job_ids(), vec!["backfill", "expiry"]);

		scheduler.shutdown().await;
	}

	#[tokio::test]
	async fn test_trigger_nonexistent_job_returns_not_found() {
		let (scheduler, _) = setup().await;
		let result = scheduler.trigger("missing", TriggerSource::Manual).await;
		assert!(matches!(result, Err(JobError::NotFound(id)) if id == "missing"));
	}

	#[tokio::test]
	async fn test_trigger_records_successful_run() {
		let (mut scheduler, repository) = setup().await;
		scheduler.register_one_shot(Arc::new(MockJob::ok("expiry")));
		scheduler.sync_definitions().await.unwrap();

		let run_id = scheduler.trigger("expiry", TriggerSource::Manual).await.unwrap();
		let last = repository.get_last_run("expiry").await.unwrap().unwrap();
		assert_eq!(last.id, run_id);
		assert_eq!(last.status, JobStatus::Succeeded);
		assert_eq!(last.triggered_by, TriggerSource::Manual);
		assert_eq!(last.metadata, Some(serde_json::json!({"attempt": 0})));
	}

	#[tokio::test]
	async fn test_each_retry_is_recorded() {
		let (mut scheduler, repository) = setup().await;
		scheduler.register_one_shot(Arc::new(MockJob::failing("flaky", 2, true)));
		scheduler.sync_definitions().await.unwrap();

		let run_id = scheduler.trigger("flaky", TriggerSource::Manual).await.unwrap();
		let runs = runs_by_attempt(&repository, "flaky").await;
		assert_eq!(runs.len(), 3);

		assert_eq!(runs[0].status, JobStatus::Failed);
		assert_eq!(runs[0].triggered_by, TriggerSource::Manual);
		assert_eq!(runs[0].error_message.as_deref(), Some("attempt 0 failed"));
		assert_eq!(runs[1].status, JobStatus::Failed);
		assert_eq!(runs[1].triggered_by, TriggerSource::Retry);
		assert_eq!(runs[2].status, JobStatus::Succeeded);
		assert_eq!(runs[2].retry_count, 2);
		assert_eq!(runs[2].id, run_id);
	}

	#[tokio::test]
	async fn test_retries_stop_after_limit() {
		let (mut scheduler, repository) = setup().await;
		scheduler.register_one_shot(Arc::new(MockJob::failing("broken", 10, true)));
		scheduler.sync_definitions().await.unwrap();

		let result = scheduler.trigger("broken", TriggerSource::Manual).await;
		assert!(matches!(result, Err(JobError::Failed { retryable: true, .. })));

		let runs = runs_by_attempt(&repository, "broken").await;
		assert_eq!(runs.len(), 4);
		assert!(runs.iter().all(|r| r.status == JobStatus::Failed));
	}

	#[tokio::test]
	async fn test_non_retryable_failure_runs_once() {
		let (mut scheduler, repository) = setup().await;
		scheduler.register_one_shot(Arc::new(MockJob::failing("fatal", 1, false)));
		scheduler.sync_definitions().await.unwrap();

		let result = scheduler.trigger("fatal", TriggerSource::Manual).await;
		assert!(matches!(result, Err(JobError::Failed { retryable: false, .. })));
		assert_eq!(runs_by_attempt(&repository, "fatal").await.len(), 1);
	}

	#[tokio::test]
	async fn test_cancelled_job_records_cancellation() {
		let (mut scheduler, repository) = setup().await;
		scheduler.register_one_shot(Arc::new(MockJob::ok("expiry")));
		scheduler.sync_definitions().await.unwrap();
		scheduler.cancel_job("expiry").await.unwrap();

		let result = scheduler.trigger("expiry", TriggerSource::Manual).await;
		assert!(matches!(result, Err(JobError::Cancelled)));
		let last = repository.get_last_run("expiry").await.unwrap().unwrap();
		assert_eq!(last.status, JobStatus::Cancelled);
	}

	#[tokio::test]
	async fn test_periodic_job_runs_until_shutdown() {
		let (mut scheduler, repository) = setup().await;
		scheduler.register_periodic(Arc::new(MockJob::ok("tick")), Duration::from_millis(20));
		scheduler.start().await.unwrap();

		tokio::time::sleep(Duration::from_millis(150)).await;
		scheduler.shutdown().await;

		let runs = repository.list_runs("tick", 100, 0).await.unwrap();
		assert!(!runs.is_empty());
		assert!(runs.iter().all(|r| r.triggered_by == TriggerSource::Schedule));

		let count = runs.len();
		tokio::time::sleep(Duration::from_millis(60)).await;
		assert_eq!(repository.list_runs("tick", 100, 0).await.unwrap().len(), count);
	}
}
