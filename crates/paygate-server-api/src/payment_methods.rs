// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use paygate_core::PaymentMethod;
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(IntoParams))]
pub struct PaymentMethodsQuery {
	/// When set, each method carries the admin fee for this amount.
	pub amount: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct PaymentMethodResponse {
	#[serde(flatten)]
	pub method: PaymentMethod,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub admin_fee_amount: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CalculateFeeRequest {
	pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CalculateFeeResponse {
	pub payment_method_id: String,
	pub amount: i64,
	pub admin_fee: i64,
	pub total: i64,
}
