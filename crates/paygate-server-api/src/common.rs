// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::{IntoParams, ToSchema};

/// Query parameters shared by every list endpoint.
///
/// `criteria` is either JSON (`["status", "paid"]`, `{"and": [...]}`) or the
/// legacy `field:value,field2:value2` form. `sortby` is `field:asc,field2:desc`.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(IntoParams))]
pub struct ListParams {
	pub criteria: Option<String>,
	pub sortby: Option<String>,
	pub limit: Option<i64>,
	pub offset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ErrorResponse {
	pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ErrorBody {
	#[serde(rename = "type")]
	pub error_type: String,
	pub message: String,
	pub request_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	#[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
	pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_error_envelope_shape() {
		let body = ErrorResponse {
			error: ErrorBody {
				error_type: "not_found".to_string(),
				message: "Transaction not found".to_string(),
				request_id: "req-1".to_string(),
				details: None,
			},
		};
		let json = serde_json::to_value(&body).unwrap();
		assert_eq!(json["error"]["type"], "not_found");
		assert_eq!(json["error"]["request_id"], "req-1");
		assert!(json["error"].get("details").is_none());
	}
}
