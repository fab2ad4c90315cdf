// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use paygate_core::{Transaction, TransactionItem};
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CheckoutItemRequest {
	pub product_id: String,
	pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CheckoutRequest {
	pub application_id: String,
	pub user_id: String,
	pub items: Vec<CheckoutItemRequest>,
	pub payment_method_id: Option<String>,
	pub voucher_code: Option<String>,
	/// Defaults to the configured default currency.
	pub currency: Option<String>,
	pub notes: Option<String>,
	#[serde(default)]
	pub user_segments: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CancelTransactionRequest {
	pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct TransactionResponse {
	#[serde(flatten)]
	pub transaction: Transaction,
	pub items: Vec<TransactionItem>,
}
