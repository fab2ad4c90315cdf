// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentsConfig {
	/// ISO 4217 code applied when a checkout does not specify one.
	pub default_currency: String,
	pub transaction_ttl_minutes: u32,
	pub require_webhook_signature: bool,
}

impl Default for PaymentsConfig {
	fn default() -> Self {
		Self {
			default_currency: "IDR".to_string(),
			transaction_ttl_minutes: 1440, // 24 hours
			require_webhook_signature: true,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentsConfigLayer {
	pub default_currency: Option<String>,
	pub transaction_ttl_minutes: Option<u32>,
	pub require_webhook_signature: Option<bool>,
}

impl PaymentsConfigLayer {
	pub fn merge(&mut self, other: PaymentsConfigLayer) {
		if other.default_currency.is_some() {
			self.default_currency = other.default_currency;
		}
		if other.transaction_ttl_minutes.is_some() {
			self.transaction_ttl_minutes = other.transaction_ttl_minutes;
		}
		if other.require_webhook_signature.is_some() {
			self.require_webhook_signature = other.require_webhook_signature;
		}
	}

	pub fn finalize(self) -> Result<PaymentsConfig, ConfigError> {
		let defaults = PaymentsConfig::default();
		let currency = self
			.default_currency
			.map(|c| c.trim().to_ascii_uppercase())
			.unwrap_or(defaults.default_currency);
		if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
			return Err(ConfigError::InvalidValue {
				key: "payments.default_currency".to_string(),
				message: format!("'{currency}' is not a three-letter currency code"),
			});
		}
		Ok(PaymentsConfig {
			default_currency: currency,
			transaction_ttl_minutes: self
				.transaction_ttl_minutes
				.unwrap_or(defaults.transaction_ttl_minutes),
			require_webhook_signature: self
				.require_webhook_signature
				.unwrap_or(defaults.require_webhook_signature),
		})
	}
}
