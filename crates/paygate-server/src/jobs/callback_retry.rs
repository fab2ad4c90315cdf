// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use paygate_server_jobs::{Job, JobContext, JobError, JobOutput};
use tracing::instrument;

use crate::{api::Repositories, services::webhook};

const BATCH_SIZE: i64 = 100;

/// Re-applies stored gateway callbacks that failed to process.
///
/// When signatures are required only validly signed callbacks are picked up.
/// Each one is abandoned after `max_attempts` attempts.
pub struct CallbackRetryJob {
	repos: Repositories,
	max_attempts: u32,
	require_signature: bool,
}

impl CallbackRetryJob {
	pub fn new(repos: Repositories, max_attempts: u32, require_signature: bool) -> Self {
		Self {
			repos,
			max_attempts,
			require_signature,
		}
	}
}

#[async_trait]
impl Job for CallbackRetryJob {
	fn id(&self) -> &str {
		"callback-retry"
	}

	fn name(&self) -> &str {
		"Callback Retry"
	}

	fn description(&self) -> &str {
		"Retries unprocessed gateway callbacks"
	}

	#[instrument(skip(self, ctx), fields(job_id = "callback-retry"))]
	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
		if ctx.is_cancelled() {
			return Err(JobError::Cancelled);
		}

		let pending = self
			.repos
			.callbacks
			.list_retryable(
				i64::from(self.max_attempts),
				BATCH_SIZE,
				self.require_signature,
			)
			.await
			.map_err(|e| JobError::retryable(e.to_string()))?;

		let mut processed = 0u32;
		let mut failed = 0u32;
		for callback in &pending {
			if ctx.is_cancelled() {
				return Err(JobError::Cancelled);
			}

			let gateway = match self.repos.payment_methods.get_gateway(&callback.gateway_id).await {
				Ok(Some(gateway)) => gateway,
				Ok(None) => {
					failed += 1;
					self.repos
						.callbacks
						.record_failure(&callback.id, "gateway no longer exists")
						.await
						.map_err(|e| JobError::retryable(e.to_string()))?;
					continue;
				}
				Err(e) => return Err(JobError::retryable(e.to_string())),
			};

			match webhook::settle(&self.repos, callback, &gateway).await {
				Ok(transaction) => {
					processed += 1;
					tracing::info!(
						callback_id = %callback.id,
						transaction_id = %transaction.id,
						status = %transaction.status,
						"callback applied on retry"
					);
				}
				Err(e) => {
					failed += 1;
					tracing::warn!(callback_id = %callback.id, error = %e, "callback retry failed");
				}
			}
		}

		Ok(JobOutput::new(format!(
			"Retried {} callbacks: {processed} applied, {failed} failed",
			pending.len()
		))
		.with_metadata(serde_json::json!({
			"candidates": pending.len(),
			"processed": processed,
			"failed": failed,
		})))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::jobs::test_context;
	use paygate_core::TransactionStatus;
	use paygate_server_db::{testing, time};
	use serde_json::json;

	async fn setup() -> (Repositories, testing::CheckoutFixture) {
		let pool = testing::create_test_pool().await;
		let f = testing::seed_checkout(&pool).await;
		(Repositories::new(pool), f)
	}

	#[tokio::test]
	async fn test_applies_pending_callback() {
		let (repos, f) = setup().await;
		let (trx, items) = testing::transaction(&f, 2);
		repos.transactions.create(&trx, &items, None).await.unwrap();
		let callback = testing::callback(
			&f.gateway.id,
			json!({"order_id": trx.invoice_number, "transaction_status": "settlement"}),
		);
		repos.callbacks.record(&callback).await.unwrap();

		let job = CallbackRetryJob::new(repos.clone(), 5, true);
		let output = job.run(&test_context()).await.unwrap();
		let meta = output.metadata.unwrap();
		assert_eq!(meta["processed"], 1);
		assert_eq!(meta["failed"], 0);

		let updated = repos.transactions.get(&trx.id).await.unwrap().unwrap();
		assert_eq!(updated.status, TransactionStatus::Settlement);
		assert!(repos.callbacks.get(&callback.id).await.unwrap().unwrap().is_processed);
	}

	#[tokio::test]
	async fn test_gives_up_after_max_attempts() {
		let (repos, f) = setup().await;
		let callback = testing::callback(
			&f.gateway.id,
			json!({"order_id": "INV/UNKNOWN", "transaction_status": "settlement"}),
		);
		repos.callbacks.record(&callback).await.unwrap();

		let job = CallbackRetryJob::new(repos.clone(), 2, true);
		for _ in 0..2 {
			let output = job.run(&test_context()).await.unwrap();
			assert_eq!(output.metadata.unwrap()["failed"], 1);
		}

		let stored = repos.callbacks.get(&callback.id).await.unwrap().unwrap();
		assert_eq!(stored.attempts, 2);
		assert!(!stored.is_processed);

		let output = job.run(&test_context()).await.unwrap();
		assert_eq!(output.metadata.unwrap()["candidates"], 0);
	}

	#[tokio::test]
	async fn test_skips_unsigned_callbacks() {
		let (repos, f) = setup().await;
		let (trx, items) = testing::transaction(&f, 1);
		repos.transactions.create(&trx, &items, None).await.unwrap();
		let mut callback = testing::callback(
			&f.gateway.id,
			json!({"order_id": trx.invoice_number, "transaction_status": "settlement"}),
		);
		callback.is_signature_valid = false;
		repos.callbacks.record(&callback).await.unwrap();

		let output = CallbackRetryJob::new(repos.clone(), 5, true)
			.run(&test_context())
			.await
			.unwrap();
		assert_eq!(output.metadata.unwrap()["candidates"], 0);
		let unchanged = repos.transactions.get(&trx.id).await.unwrap().unwrap();
		assert_eq!(unchanged.status, TransactionStatus::Pending);
	}

	#[tokio::test]
	async fn test_retries_unsigned_callback_when_signatures_optional() {
		let (repos, f) = setup().await;
		let (trx, items) = testing::transaction(&f, 1);
		let payload = json!({"order_id": trx.invoice_number, "transaction_status": "settlement"});

		// Delivered before the transaction exists, so the first attempt fails.
		let delivery = webhook::Delivery {
			body: serde_json::to_vec(&payload).unwrap(),
			signature: None,
			ip_address: None,
			user_agent: None,
		};
		let first = webhook::receive(&repos, "midtrans", delivery, false, time::now()).await;
		assert!(first.is_err());
		repos.transactions.create(&trx, &items, None).await.unwrap();

		let strict = CallbackRetryJob::new(repos.clone(), 5, true)
			.run(&test_context())
			.await
			.unwrap();
		assert_eq!(strict.metadata.unwrap()["candidates"], 0);

		let output = CallbackRetryJob::new(repos.clone(), 5, false)
			.run(&test_context())
			.await
			.unwrap();
		let meta = output.metadata.unwrap();
		assert_eq!(meta["candidates"], 1);
		assert_eq!(meta["processed"], 1);
		let updated = repos.transactions.get(&trx.id).await.unwrap().unwrap();
		assert_eq!(updated.status, TransactionStatus::Settlement);
	}
}
