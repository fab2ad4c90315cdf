// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use paygate_server_jobs::{Job, JobContext, JobError, JobOutput, JobRepository};
use std::sync::Arc;

pub struct JobHistoryCleanupJob {
	repository: Arc<JobRepository>,
	retention_days: u32,
}

impl JobHistoryCleanupJob {
	pub fn new(repository: Arc<JobRepository>, retention_days: u32) -> Self {
		Self {
			repository,
			retention_days,
		}
	}
}

#[async_trait]
impl Job for JobHistoryCleanupJob {
	fn id(&self) -> &str {
		"job-history-cleanup"
	}

	fn name(&self) -> &str {
		"Job History Cleanup"
	}

	fn description(&self) -> &str {
		"Removes finished job runs past the retention window"
	}

	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
		if ctx.is_cancelled() {
			return Err(JobError::Cancelled);
		}

		let count = self
			.repository
			.cleanup_old_runs(self.retention_days)
			.await
			.map_err(|e| JobError::retryable(format!("job history cleanup failed: {e}")))?;

		tracing::info!(
			deleted = count,
			retention_days = self.retention_days,
			"job history cleanup completed"
		);
		Ok(
			JobOutput::new(format!("Cleaned up {count} old job run records")).with_metadata(
				serde_json::json!({
					"deleted_count": count,
					"retention_days": self.retention_days
				}),
			),
		)
	}
}
