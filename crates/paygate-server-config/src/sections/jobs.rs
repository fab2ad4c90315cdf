// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Jobs configuration section.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobsConfigLayer {
	pub enabled: Option<bool>,
	pub expiry_interval_secs: Option<u64>,
	pub callback_retry_interval_secs: Option<u64>,
	pub callback_max_attempts: Option<u32>,
	pub history_retention_days: Option<u32>,
}

impl JobsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.expiry_interval_secs.is_some() {
			self.expiry_interval_secs = other.expiry_interval_secs;
		}
		if other.callback_retry_interval_secs.is_some() {
			self.callback_retry_interval_secs = other.callback_retry_interval_secs;
		}
		if other.callback_max_attempts.is_some() {
			self.callback_max_attempts = other.callback_max_attempts;
		}
		if other.history_retention_days.is_some() {
			self.history_retention_days = other.history_retention_days;
		}
	}

	pub fn finalize(self) -> JobsConfig {
		let defaults = JobsConfig::default();
		JobsConfig {
			enabled: self.enabled.unwrap_or(defaults.enabled),
			expiry_interval_secs: self
				.expiry_interval_secs
				.unwrap_or(defaults.expiry_interval_secs),
			callback_retry_interval_secs: self
				.callback_retry_interval_secs
				.unwrap_or(defaults.callback_retry_interval_secs),
			callback_max_attempts: self
				.callback_max_attempts
				.unwrap_or(defaults.callback_max_attempts),
			history_retention_days: self
				.history_retention_days
				.unwrap_or(defaults.history_retention_days),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobsConfig {
	pub enabled: bool,
	pub expiry_interval_secs: u64,
	pub callback_retry_interval_secs: u64,
	pub callback_max_attempts: u32,
	pub history_retention_days: u32,
}

impl Default for JobsConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			expiry_interval_secs: 60,
			callback_retry_interval_secs: 300, // 5 minutes
			callback_max_attempts: 5,
			history_retention_days: 30,
		}
	}
}
