// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Normalization of gateway webhook payloads.
//!
//! Every gateway reports the same facts (which invoice, what happened, the
//! gateway's own reference) under different field names and status
//! vocabularies. [`GatewayNotification::parse`] maps them onto
//! [`TransactionStatus`].

use serde::Serialize;
use serde_json::Value;

use crate::enums::{CallbackType, GatewayType, TransactionStatus};
use crate::error::{DomainError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayNotification {
	pub invoice_number: String,
	/// Status exactly as the gateway sent it.
	pub gateway_status: String,
	pub status: TransactionStatus,
	pub payment_reference: Option<String>,
	pub callback_type: CallbackType,
}

/// Look up a dotted path such as `order.invoice_number`.
fn field<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
	path.split('.').try_fold(payload, |node, key| node.get(key))
}

fn text(payload: &Value, path: &str) -> Option<String> {
	match field(payload, path)? {
		Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
		Value::Number(n) => Some(n.to_string()),
		_ => None,
	}
}

fn required(payload: &Value, path: &str) -> Result<String> {
	text(payload, path).ok_or_else(|| DomainError::InvalidNotification(path.to_string()))
}

struct FieldMap {
	invoice: &'static str,
	status: &'static str,
	reference: &'static str,
}

fn field_map(gateway: GatewayType) -> FieldMap {
	match gateway {
		GatewayType::Midtrans => FieldMap {
			invoice: "order_id",
			status: "transaction_status",
			reference: "transaction_id",
		},
		GatewayType::Xendit => FieldMap {
			invoice: "external_id",
			status: "status",
			reference: "id",
		},
		GatewayType::Doku => FieldMap {
			invoice: "order.invoice_number",
			status: "transaction.status",
			reference: "transaction.original_request_id",
		},
		GatewayType::Nicepay => FieldMap {
			invoice: "referenceNo",
			status: "status",
			reference: "tXid",
		},
		GatewayType::Faspay => FieldMap {
			invoice: "bill_no",
			status: "payment_status_code",
			reference: "trx_id",
		},
	}
}

fn map_status(gateway: GatewayType, raw: &str, payload: &Value) -> Option<TransactionStatus> {
	use TransactionStatus::*;
	let status = match gateway {
		GatewayType::Midtrans => {
			let fraud_denied = text(payload, "fraud_status").is_some_and(|f| f.eq_ignore_ascii_case("deny"));
			match raw.to_ascii_lowercase().as_str() {
				"capture" | "settlement" if fraud_denied => Failed,
				"capture" => Paid,
				"settlement" => Settlement,
				"pending" => AwaitingPayment,
				"deny" | "failure" => Failed,
				"cancel" => Cancelled,
				"expire" => Expired,
				"refund" | "partial_refund" => Refunded,
				_ => return None,
			}
		}
		GatewayType::Xendit => match raw.to_ascii_uppercase().as_str() {
			"PENDING" => AwaitingPayment,
			"PAID" => Paid,
			"SETTLED" => Settlement,
			"EXPIRED" => Expired,
			"FAILED" => Failed,
			_ => return None,
		},
		GatewayType::Doku => match raw.to_ascii_uppercase().as_str() {
			"SUCCESS" => Paid,
			"FAILED" => Failed,
			"EXPIRED" => Expired,
			"PENDING" => AwaitingPayment,
			_ => return None,
		},
		GatewayType::Nicepay => match raw {
			"0" => Paid,
			"1" => Failed,
			"2" | "9" => Cancelled,
			"3" => AwaitingPayment,
			"4" => Expired,
			_ => return None,
		},
		GatewayType::Faspay => match raw {
			"1" => AwaitingPayment,
			"2" => Paid,
			"3" => Failed,
			"4" => Refunded,
			"7" => Expired,
			"8" => Cancelled,
			_ => return None,
		},
	};
	Some(status)
}

impl GatewayNotification {
	pub fn parse(gateway: GatewayType, payload: &Value) -> Result<Self> {
		if !payload.is_object() {
			return Err(DomainError::InvalidNotification("payload".to_string()));
		}

		let fields = field_map(gateway);
		let invoice_number = required(payload, fields.invoice)?;
		let gateway_status = required(payload, fields.status)?;
		let status = map_status(gateway, &gateway_status, payload)
			.ok_or_else(|| DomainError::UnknownGatewayStatus(gateway_status.clone()))?;
		let payment_reference = text(payload, fields.reference);

		let callback_type = if status == TransactionStatus::Refunded {
			CallbackType::RefundNotification
		} else {
			CallbackType::PaymentNotification
		};

		Ok(Self {
			invoice_number,
			gateway_status,
			status,
			payment_reference,
			callback_type,
		})
	}
}
