// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Serialize;
use thiserror::Error;

use crate::enums::{ConditionType, TransactionStatus};

pub type Result<T> = std::result::Result<T, DomainError>;

/// Errors raised by pure business rules.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
	#[error("unknown {kind}: {value}")]
	UnknownVariant { kind: &'static str, value: String },

	#[error("invalid line item: {0}")]
	InvalidLine(String),

	#[error("amount overflow")]
	AmountOverflow,

	#[error("cannot transition transaction from {from} to {to}")]
	InvalidTransition {
		from: TransactionStatus,
		to: TransactionStatus,
	},

	#[error("invalid notification: missing or malformed field '{0}'")]
	InvalidNotification(String),

	#[error("unknown gateway status '{0}'")]
	UnknownGatewayStatus(String),

	#[error("voucher rejected: {0}")]
	VoucherRejected(VoucherRejection),
}

impl From<VoucherRejection> for DomainError {
	fn from(rejection: VoucherRejection) -> Self {
		DomainError::VoucherRejected(rejection)
	}
}

/// Reason a voucher cannot be applied to a checkout.
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum VoucherRejection {
	#[error("voucher is not active")]
	Inactive,

	#[error("voucher is not valid yet")]
	NotYetValid,

	#[error("voucher has expired")]
	Expired,

	#[error("voucher usage limit reached")]
	UsageLimitReached,

	#[error("voucher usage limit per user reached")]
	UserLimitReached,

	#[error("minimum transaction of {required} not met")]
	MinimumNotMet { required: i64 },

	#[error("user is not eligible for this voucher")]
	NotEligible,

	#[error("voucher condition '{condition_type}' not satisfied")]
	ConditionFailed { condition_type: ConditionType },

	#[error("voucher condition '{condition_type}' is misconfigured: {message}")]
	InvalidCondition {
		condition_type: ConditionType,
		message: String,
	},
}

impl VoucherRejection {
	/// Stable machine-readable code.
	pub fn code(&self) -> &'static str {
		match self {
			VoucherRejection::Inactive => "inactive",
			VoucherRejection::NotYetValid => "not_yet_valid",
			VoucherRejection::Expired => "expired",
			VoucherRejection::UsageLimitReached => "usage_limit_reached",
			VoucherRejection::UserLimitReached => "user_limit_reached",
			VoucherRejection::MinimumNotMet { .. } => "minimum_not_met",
			VoucherRejection::NotEligible => "not_eligible",
			VoucherRejection::ConditionFailed { .. } => "condition_failed",
			VoucherRejection::InvalidCondition { .. } => "invalid_condition",
		}
	}
}
