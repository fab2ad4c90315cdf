// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use paygate_server_db::{time, TransactionRepository};
use paygate_server_jobs::{Job, JobContext, JobError, JobOutput};
use tracing::instrument;

/// Moves open transactions whose payment window closed to `expired`.
pub struct TransactionExpiryJob {
	transactions: TransactionRepository,
}

impl TransactionExpiryJob {
	pub fn new(transactions: TransactionRepository) -> Self {
		Self { transactions }
	}
}

#[async_trait]
impl Job for TransactionExpiryJob {
	fn id(&self) -> &str {
		"transaction-expiry"
	}

	fn name(&self) -> &str {
		"Transaction Expiry"
	}

	fn description(&self) -> &str {
		"Expires pending transactions past their payment deadline"
	}

	#[instrument(skip(self, ctx), fields(job_id = "transaction-expiry"))]
	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
		if ctx.is_cancelled() {
			return Err(JobError::Cancelled);
		}

		let expired = self
			.transactions
			.expire_overdue(time::now())
			.await
			.map_err(|e| JobError::retryable(format!("transaction expiry failed: {e}")))?;

		if expired > 0 {
			tracing::info!(expired, "expired overdue transactions");
		}
		Ok(JobOutput::new(format!("Expired {expired} transactions"))
			.with_metadata(serde_json::json!({ "expired_count": expired })))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::jobs::test_context;
	use paygate_core::{ChangedBy, TransactionStatus};
	use paygate_server_db::testing;

	#[tokio::test]
	async fn test_expires_only_overdue_transactions() {
		let pool = testing::create_test_pool().await;
		let f = testing::seed_checkout(&pool).await;
		let transactions = TransactionRepository::new(pool);

		let (mut overdue, items) = testing::transaction(&f, 1);
		overdue.expired_at = Some(time::now() - chrono::Duration::minutes(5));
		transactions.create(&overdue, &items, None).await.unwrap();

		let (open, items) = testing::transaction(&f, 1);
		transactions.create(&open, &items, None).await.unwrap();

		let job = TransactionExpiryJob::new(transactions.clone());
		let output = job.run(&test_context()).await.unwrap();
		assert_eq!(output.metadata.unwrap()["expired_count"], 1);

		let expired = transactions.get(&overdue.id).await.unwrap().unwrap();
		assert_eq!(expired.status, TransactionStatus::Expired);
		let last = transactions.logs(&overdue.id).await.unwrap().pop().unwrap();
		assert_eq!(last.changed_by, ChangedBy::System);

		let still_open = transactions.get(&open.id).await.unwrap().unwrap();
		assert_eq!(still_open.status, TransactionStatus::Pending);

		let output = job.run(&test_context()).await.unwrap();
		assert_eq!(output.metadata.unwrap()["expired_count"], 0);
	}
}
