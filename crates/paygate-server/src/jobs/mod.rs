// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background jobs registered with the scheduler at startup.

pub mod callback_retry;
pub mod job_history_cleanup;
pub mod transaction_expiry;

pub use callback_retry::CallbackRetryJob;
pub use job_history_cleanup::JobHistoryCleanupJob;
pub use transaction_expiry::TransactionExpiryJob;

#[cfg(test)]
pub(crate) fn test_context() -> paygate_server_jobs::JobContext {
	paygate_server_jobs::JobContext {
		run_id: "test-run".to_string(),
		triggered_by: paygate_server_jobs::TriggerSource::Manual,
		attempt: 0,
		cancellation_token: paygate_server_jobs::CancellationToken::new(),
	}
}
