// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::types::TriggerSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Passed to [`crate::Job::run`] for a single attempt.
pub struct JobContext {
	pub run_id: String,
	pub triggered_by: TriggerSource,
	/// Zero for the first attempt.
	pub attempt: u32,
	pub cancellation_token: CancellationToken,
}

impl JobContext {
	pub fn is_cancelled(&self) -> bool {
		self.cancellation_token.is_cancelled()
	}
}

#[derive(Clone, Debug)]
pub struct CancellationToken {
	cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
	pub fn new() -> Self {
		Self {
			cancelled: Arc::new(AtomicBool::new(false)),
		}
	}

	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::SeqCst)
	}
}

impl Default for CancellationToken {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_clones_share_state() {
		let token = CancellationToken::new();
		let clone = token.clone();
		assert!(!clone.is_cancelled());

		token.cancel();
		assert!(clone.is_cancelled());
	}
}
