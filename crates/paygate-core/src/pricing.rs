// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Checkout arithmetic.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};
use crate::fee::AdminFee;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteLine {
	pub product_id: String,
	pub unit_price: i64,
	pub quantity: i64,
}

impl QuoteLine {
	pub fn subtotal(&self) -> Result<i64> {
		if self.quantity <= 0 {
			return Err(DomainError::InvalidLine(format!(
				"quantity for product {} must be positive",
				self.product_id
			)));
		}
		if self.unit_price < 0 {
			return Err(DomainError::InvalidLine(format!(
				"unit price for product {} must not be negative",
				self.product_id
			)));
		}
		self
			.unit_price
			.checked_mul(self.quantity)
			.ok_or(DomainError::AmountOverflow)
	}
}

/// Totals of a checkout in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
	pub subtotal: i64,
	pub discount_amount: i64,
	pub admin_fee: i64,
	pub total_amount: i64,
}

impl Quote {
	/// The admin fee is charged on the discounted amount.
	pub fn build(lines: &[QuoteLine], discount: i64, fee: &AdminFee) -> Result<Self> {
		let mut subtotal: i64 = 0;
		for line in lines {
			subtotal = subtotal
				.checked_add(line.subtotal()?)
				.ok_or(DomainError::AmountOverflow)?;
		}

		let discount_amount = discount.clamp(0, subtotal);
		let base = subtotal - discount_amount;
		let admin_fee = fee.compute(base);
		let total_amount = base
			.checked_add(admin_fee)
			.ok_or(DomainError::AmountOverflow)?;

		Ok(Self {
			subtotal,
			discount_amount,
			admin_fee,
			total_amount,
		})
	}
}
