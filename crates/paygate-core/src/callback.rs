// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::CallbackType;

/// A webhook delivery received from a payment gateway, stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GatewayCallback {
	pub id: String,
	/// Unknown until the payload is matched to a transaction.
	pub transaction_id: Option<String>,
	pub gateway_id: String,
	pub callback_type: CallbackType,
	#[cfg_attr(feature = "openapi", schema(value_type = Object))]
	pub raw_payload: serde_json::Value,
	pub signature: Option<String>,
	pub is_signature_valid: bool,
	pub is_processed: bool,
	pub processed_at: Option<DateTime<Utc>>,
	pub attempts: i64,
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
	pub notes: Option<String>,
	pub created_at: DateTime<Utc>,
}
