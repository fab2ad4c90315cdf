// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Admin fee charged by a payment method.

use serde::{Deserialize, Serialize};

use crate::enums::AdminFeeType;

/// Fee configuration of a payment method.
///
/// For [`AdminFeeType::Fixed`] `value` is an amount in minor units; for
/// [`AdminFeeType::Percentage`] it is a percentage (`2.5` = 2.5 %).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdminFee {
	pub fee_type: AdminFeeType,
	pub value: f64,
}

impl AdminFee {
	pub fn fixed(amount: i64) -> Self {
		Self {
			fee_type: AdminFeeType::Fixed,
			value: amount as f64,
		}
	}

	pub fn percentage(percent: f64) -> Self {
		Self {
			fee_type: AdminFeeType::Percentage,
			value: percent,
		}
	}

	pub fn none() -> Self {
		Self::fixed(0)
	}

	/// Fee for a base amount in minor units. Never negative.
	pub fn compute(&self, amount: i64) -> i64 {
		if !self.value.is_finite() || self.value <= 0.0 {
			return 0;
		}
		match self.fee_type {
			AdminFeeType::Fixed => self.value.round() as i64,
			AdminFeeType::Percentage => percent_of(amount, self.value),
		}
	}
}

impl Default for AdminFee {
	fn default() -> Self {
		Self::none()
	}
}

/// `amount × percent / 100`, rounded half away from zero. Zero for non-positive amounts.
pub fn percent_of(amount: i64, percent: f64) -> i64 {
	if amount <= 0 || !percent.is_finite() || percent <= 0.0 {
		return 0;
	}
	let raw = (amount as f64) * percent / 100.0;
	let rounded = raw.round();
	if rounded >= i64::MAX as f64 {
		i64::MAX
	} else {
		rounded as i64
	}
}
