// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Payment methods, gateways and the links between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{AdminFeeType, GatewayType, MethodType};
use crate::fee::AdminFee;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PaymentMethod {
	pub id: String,
	pub method_code: String,
	pub method_name: String,
	pub method_type: MethodType,
	pub provider: Option<String>,
	pub icon_url: Option<String>,
	pub is_active: bool,
	pub admin_fee: f64,
	pub admin_fee_type: AdminFeeType,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl PaymentMethod {
	pub fn fee(&self) -> AdminFee {
		AdminFee {
			fee_type: self.admin_fee_type,
			value: self.admin_fee,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PaymentGateway {
	pub id: String,
	pub gateway_code: String,
	pub gateway_name: String,
	pub gateway_type: GatewayType,
	pub base_url: String,
	pub is_active: bool,
	pub is_sandbox: bool,
	pub priority: i64,
	#[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
	pub supported_methods: Option<serde_json::Value>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Per-application secrets for a gateway. Never serialized to clients.
#[derive(Clone, PartialEq)]
pub struct GatewayCredential {
	pub id: String,
	pub application_id: String,
	pub gateway_id: String,
	pub merchant_id: Option<String>,
	pub api_key: Option<String>,
	pub api_secret: Option<String>,
	pub client_key: Option<String>,
	pub webhook_secret: Option<String>,
	pub additional_config: Option<serde_json::Value>,
	pub is_active: bool,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for GatewayCredential {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GatewayCredential")
			.field("id", &self.id)
			.field("application_id", &self.application_id)
			.field("gateway_id", &self.gateway_id)
			.field("merchant_id", &self.merchant_id)
			.field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
			.field("api_secret", &self.api_secret.as_ref().map(|_| "[REDACTED]"))
			.field("client_key", &self.client_key.as_ref().map(|_| "[REDACTED]"))
			.field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "[REDACTED]"))
			.field("is_active", &self.is_active)
			.finish()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PaymentMethodGateway {
	pub id: String,
	pub payment_method_id: String,
	pub gateway_id: String,
	pub gateway_method_code: String,
	pub is_active: bool,
	pub processing_time_minutes: i64,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_method_fee_uses_configured_type() {
		let now = Utc::now();
		let method = PaymentMethod {
			id: "m1".to_string(),
			method_code: "BCA_VA".to_string(),
			method_name: "BCA Virtual Account".to_string(),
			method_type: MethodType::VirtualAccount,
			provider: Some("bca".to_string()),
			icon_url: None,
			is_active: true,
			admin_fee: 1.5,
			admin_fee_type: AdminFeeType::Percentage,
			created_at: now,
			updated_at: now,
		};
		assert_eq!(method.fee().compute(200_000), 3_000);
	}

	#[test]
	fn test_credential_debug_redacts_secrets() {
		let now = Utc::now();
		let cred = GatewayCredential {
			id: "c1".to_string(),
			application_id: "app".to_string(),
			gateway_id: "g1".to_string(),
			merchant_id: Some("M-1".to_string()),
			api_key: Some("sk_live_123".to_string()),
			api_secret: None,
			client_key: None,
			webhook_secret: Some("whsec_abc".to_string()),
			additional_config: None,
			is_active: true,
			created_at: now,
			updated_at: now,
		};
		let debug = format!("{cred:?}");
		assert!(!debug.contains("sk_live_123"));
		assert!(!debug.contains("whsec_abc"));
		assert!(debug.contains("[REDACTED]"));
	}
}
