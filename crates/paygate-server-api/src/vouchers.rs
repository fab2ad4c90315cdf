// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use paygate_core::{ConditionType, DiscountType, OperatorType, VoucherType};
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::{IntoParams, ToSchema};

fn default_true() -> bool {
	true
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CreateVoucherRequest {
	pub application_id: String,
	pub voucher_code: String,
	pub voucher_name: String,
	pub description: Option<String>,
	#[serde(default = "default_voucher_type")]
	pub voucher_type: VoucherType,
	pub discount_type: DiscountType,
	pub discount_value: f64,
	pub max_discount: Option<i64>,
	#[serde(default)]
	pub min_transaction: i64,
	pub usage_limit: Option<i64>,
	pub usage_limit_per_user: Option<i64>,
	pub valid_from: Option<DateTime<Utc>>,
	pub valid_until: Option<DateTime<Utc>>,
	#[serde(default = "default_true")]
	pub is_active: bool,
	#[serde(default)]
	pub is_auto_apply: bool,
	#[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
	pub applicable_products: Option<serde_json::Value>,
}

fn default_voucher_type() -> VoucherType {
	VoucherType::Public
}

/// Every field is optional; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct UpdateVoucherRequest {
	pub voucher_name: Option<String>,
	pub description: Option<String>,
	pub discount_value: Option<f64>,
	pub max_discount: Option<i64>,
	pub min_transaction: Option<i64>,
	pub usage_limit: Option<i64>,
	pub usage_limit_per_user: Option<i64>,
	pub valid_from: Option<DateTime<Utc>>,
	pub valid_until: Option<DateTime<Utc>>,
	pub is_active: Option<bool>,
	pub is_auto_apply: Option<bool>,
	#[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
	pub applicable_products: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct EligibleUsersRequest {
	pub application_id: String,
	pub user_ids: Vec<String>,
	pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct EligibleUsersResponse {
	pub inserted: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CreateConditionRequest {
	pub condition_type: ConditionType,
	pub operator: OperatorType,
	/// A bare value or `{"value": ...}`.
	#[cfg_attr(feature = "openapi", schema(value_type = Object))]
	pub condition_value: serde_json::Value,
	#[serde(default = "default_true")]
	pub is_required: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ValidateVoucherRequest {
	pub user_id: String,
	pub subtotal: i64,
	#[serde(default)]
	pub product_ids: Vec<String>,
	pub payment_method_code: Option<String>,
	#[serde(default)]
	pub user_segments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ValidateVoucherResponse {
	pub valid: bool,
	pub discount_amount: i64,
	/// Machine-readable rejection code.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ClaimVoucherRequest {
	pub user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(IntoParams))]
pub struct MyVouchersQuery {
	pub user_id: String,
}
