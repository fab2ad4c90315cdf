// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Transactions and their status lifecycle.
//!
//! ```text
//! pending ──► awaiting_payment ──► paid ──► settlement
//!    │               │              │           │
//!    └──────┬────────┘              └─────┬─────┘
//!           ▼                             ▼
//!  expired | cancelled | failed        refunded
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{ChangedBy, TransactionStatus};
use crate::error::DomainError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Transaction {
	pub id: String,
	pub application_id: String,
	pub user_id: String,
	pub transaction_code: String,
	pub invoice_number: String,
	pub payment_method_id: Option<String>,
	pub gateway_id: Option<String>,
	pub voucher_id: Option<String>,
	pub status: TransactionStatus,
	pub subtotal: i64,
	pub discount_amount: i64,
	pub admin_fee: i64,
	pub total_amount: i64,
	pub currency: String,
	pub payment_url: Option<String>,
	pub payment_token: Option<String>,
	pub payment_reference: Option<String>,
	pub va_number: Option<String>,
	pub qr_code_url: Option<String>,
	pub paid_at: Option<DateTime<Utc>>,
	pub expired_at: Option<DateTime<Utc>>,
	pub notes: Option<String>,
	#[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
	pub extra_data: Option<serde_json::Value>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TransactionItem {
	pub id: String,
	pub transaction_id: String,
	pub product_id: String,
	pub product_name: String,
	pub product_code: String,
	pub quantity: i64,
	pub unit_price: i64,
	pub subtotal: i64,
	#[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
	pub item_metadata: Option<serde_json::Value>,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TransactionLog {
	pub id: String,
	pub transaction_id: String,
	pub previous_status: Option<TransactionStatus>,
	pub new_status: TransactionStatus,
	pub changed_by: ChangedBy,
	pub gateway_callback_id: Option<String>,
	pub notes: Option<String>,
	#[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
	pub log_metadata: Option<serde_json::Value>,
	pub created_at: DateTime<Utc>,
}

impl TransactionStatus {
	/// Statuses reachable in one step.
	pub fn successors(&self) -> &'static [TransactionStatus] {
		use TransactionStatus::*;
		match self {
			Pending => &[AwaitingPayment, Paid, Settlement, Expired, Cancelled, Failed],
			AwaitingPayment => &[Paid, Settlement, Expired, Cancelled, Failed],
			Paid => &[Settlement, Refunded],
			Settlement => &[Refunded],
			Expired | Cancelled | Failed | Refunded => &[],
		}
	}

	pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
		self.successors().contains(&next)
	}

	pub fn is_terminal(&self) -> bool {
		self.successors().is_empty()
	}

	/// Payment can still arrive.
	pub fn is_open(&self) -> bool {
		matches!(
			self,
			TransactionStatus::Pending | TransactionStatus::AwaitingPayment
		)
	}

	pub fn is_paid(&self) -> bool {
		matches!(self, TransactionStatus::Paid | TransactionStatus::Settlement)
	}
}

/// Outcome of applying a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
	/// Already in the requested status; nothing to record.
	Unchanged,
	Changed {
		from: TransactionStatus,
		to: TransactionStatus,
	},
}

impl Transaction {
	/// Move to `next`, enforcing the lifecycle. Stamps `paid_at` on the first
	/// entry into a paid status.
	pub fn apply_status(
		&mut self,
		next: TransactionStatus,
		now: DateTime<Utc>,
	) -> Result<Transition, DomainError> {
		let from = self.status;
		if from == next {
			return Ok(Transition::Unchanged);
		}
		if !from.can_transition_to(next) {
			return Err(DomainError::InvalidTransition { from, to: next });
		}
		self.status = next;
		if next.is_paid() && self.paid_at.is_none() {
			self.paid_at = Some(now);
		}
		self.updated_at = now;
		Ok(Transition::Changed { from, to: next })
	}

	pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
		self.status.is_open() && self.expired_at.is_some_and(|at| at < now)
	}
}
