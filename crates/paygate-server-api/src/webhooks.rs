// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use paygate_core::TransactionStatus;
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WebhookProcessedResponse {
	pub callback_id: String,
	pub transaction_id: String,
	pub status: TransactionStatus,
}

/// Lets integrators check their signing code against the server's.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WebhookTestRequest {
	pub secret: String,
	/// Signed as its compact JSON serialization.
	#[cfg_attr(feature = "openapi", schema(value_type = Object))]
	pub payload: serde_json::Value,
	pub signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WebhookTestResponse {
	pub expected_signature: String,
	/// `None` when no signature was supplied.
	pub valid: Option<bool>,
}
