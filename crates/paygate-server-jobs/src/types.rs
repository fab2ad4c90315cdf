// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use paygate_server_db::{JobDefinition, JobRepository, JobRun, JobStatus, TriggerSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobType {
	Periodic { interval: Duration },
	OneShot,
}

impl JobType {
	pub fn as_str(&self) -> &'static str {
		match self {
			JobType::Periodic { .. } => "periodic",
			JobType::OneShot => "one_shot",
		}
	}

	pub fn interval_secs(&self) -> Option<i64> {
		match self {
			JobType::Periodic { interval } => i64::try_from(interval.as_secs()).ok(),
			JobType::OneShot => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
	pub message: String,
	pub metadata: Option<serde_json::Value>,
}

impl JobOutput {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			metadata: None,
		}
	}

	pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
		self.metadata = Some(metadata);
		self
	}
}
