// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server error types and the JSON error envelope.

use axum::{
	extract::rejection::{JsonRejection, PathRejection, QueryRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use paygate_core::{DomainError, VoucherRejection};
use paygate_server_api::{ErrorBody, ErrorResponse};
use paygate_server_db::{DbError, FilterError};
use serde_json::{json, Value};

use crate::request_id;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error("{0}")]
	NotFound(String),

	#[error("{0}")]
	BadRequest(String),

	/// Well-formed request with invalid content.
	#[error("{message}")]
	Validation {
		message: String,
		details: Option<Value>,
	},

	#[error("{0}")]
	Conflict(String),

	#[error("{0}")]
	InvalidSignature(String),

	/// A business rule refused the operation.
	#[error("{message}")]
	BusinessRule {
		message: String,
		details: Option<Value>,
	},

	#[error("Database error: {0}")]
	Database(DbError),

	#[error("Internal error: {0}")]
	Internal(String),
}

impl ServerError {
	pub fn not_found(what: impl std::fmt::Display) -> Self {
		ServerError::NotFound(format!("{what} not found"))
	}

	pub fn validation(message: impl Into<String>) -> Self {
		ServerError::Validation {
			message: message.into(),
			details: None,
		}
	}

	pub fn business_rule(message: impl Into<String>) -> Self {
		ServerError::BusinessRule {
			message: message.into(),
			details: None,
		}
	}

	pub fn status(&self) -> StatusCode {
		match self {
			ServerError::NotFound(_) => StatusCode::NOT_FOUND,
			ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
			ServerError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
			ServerError::Conflict(_) => StatusCode::CONFLICT,
			ServerError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
			ServerError::BusinessRule { .. } => StatusCode::UNPROCESSABLE_ENTITY,
			ServerError::Database(_) | ServerError::Internal(_) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}

	pub fn error_type(&self) -> &'static str {
		match self {
			ServerError::NotFound(_) => "not_found",
			ServerError::BadRequest(_) => "bad_request",
			ServerError::Validation { .. } => "validation_error",
			ServerError::Conflict(_) => "integrity_error",
			ServerError::InvalidSignature(_) => "invalid_signature",
			ServerError::BusinessRule { .. } => "business_rule_violation",
			ServerError::Database(_) => "database_error",
			ServerError::Internal(_) => "internal_server_error",
		}
	}

	/// Message shown to clients. Server-side failures are not described.
	fn public_message(&self) -> String {
		match self {
			ServerError::Database(_) => "A database error occurred".to_string(),
			ServerError::Internal(_) => "An internal error occurred".to_string(),
			other => other.to_string(),
		}
	}

	fn details(&self) -> Option<Value> {
		match self {
			ServerError::Validation { details, .. } | ServerError::BusinessRule { details, .. } => {
				details.clone()
			}
			_ => None,
		}
	}
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let status = self.status();
		let ctx = request_id::current();
		let request_id = ctx
			.as_ref()
			.map(|c| c.request_id.clone())
			.unwrap_or_else(|| "unknown".to_string());
		let method = ctx.as_ref().map(|c| c.method.as_str()).unwrap_or("-");
		let path = ctx.as_ref().map(|c| c.path.as_str()).unwrap_or("-");

		if status.is_server_error() {
			tracing::error!(
				request_id = %request_id,
				method,
				path,
				status = status.as_u16(),
				error = %self,
				"request failed"
			);
		} else {
			tracing::warn!(
				request_id = %request_id,
				method,
				path,
				status = status.as_u16(),
				error = %self,
				"request rejected"
			);
		}

		let body = ErrorResponse {
			error: ErrorBody {
				error_type: self.error_type().to_string(),
				message: self.public_message(),
				request_id,
				details: self.details(),
			},
		};
		(status, Json(body)).into_response()
	}
}

impl From<DbError> for ServerError {
	fn from(e: DbError) -> Self {
		if e.is_unique_violation() {
			return ServerError::Conflict("A record with the same unique value already exists".to_string());
		}
		match e {
			DbError::NotFound(what) => ServerError::not_found(what),
			DbError::Conflict(message) | DbError::AlreadyExists(message) => ServerError::Conflict(message),
			DbError::Filter(e) => e.into(),
			DbError::Domain(e) => e.into(),
			other => ServerError::Database(other),
		}
	}
}

impl From<FilterError> for ServerError {
	fn from(e: FilterError) -> Self {
		ServerError::BadRequest(e.to_string())
	}
}

impl From<DomainError> for ServerError {
	fn from(e: DomainError) -> Self {
		match e {
			DomainError::VoucherRejected(rejection) => rejection.into(),
			DomainError::UnknownVariant { .. } => ServerError::BadRequest(e.to_string()),
			DomainError::InvalidLine(_) | DomainError::AmountOverflow => {
				ServerError::validation(e.to_string())
			}
			DomainError::InvalidTransition { from, to } => ServerError::BusinessRule {
				message: e.to_string(),
				details: Some(json!({ "from": from, "to": to })),
			},
			DomainError::InvalidNotification(_) | DomainError::UnknownGatewayStatus(_) => {
				ServerError::business_rule(e.to_string())
			}
		}
	}
}

impl From<VoucherRejection> for ServerError {
	fn from(rejection: VoucherRejection) -> Self {
		ServerError::BusinessRule {
			message: rejection.to_string(),
			details: serde_json::to_value(&rejection).ok(),
		}
	}
}

impl From<JsonRejection> for ServerError {
	fn from(rejection: JsonRejection) -> Self {
		match rejection {
			JsonRejection::JsonDataError(e) => ServerError::Validation {
				message: "Request validation failed".to_string(),
				details: Some(json!({ "body": e.body_text() })),
			},
			other => ServerError::BadRequest(other.body_text()),
		}
	}
}

impl From<QueryRejection> for ServerError {
	fn from(rejection: QueryRejection) -> Self {
		ServerError::BadRequest(rejection.body_text())
	}
}

impl From<PathRejection> for ServerError {
	fn from(rejection: PathRejection) -> Self {
		ServerError::BadRequest(rejection.body_text())
	}
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
	use super::*;
	use paygate_core::TransactionStatus;

	async fn body_json(error: ServerError) -> (StatusCode, Value) {
		let response = error.into_response();
		let status = response.status();
		let body = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		(status, serde_json::from_slice(&body).unwrap())
	}

	#[tokio::test]
	async fn test_not_found_envelope() {
		let (status, body) = body_json(ServerError::not_found("Transaction")).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"]["type"], "not_found");
		assert_eq!(body["error"]["message"], "Transaction not found");
		assert_eq!(body["error"]["request_id"], "unknown");
	}

	#[tokio::test]
	async fn test_database_error_hides_detail() {
		let err = ServerError::from(DbError::Internal("disk I/O error at page 7".to_string()));
		let (status, body) = body_json(err).await;
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(body["error"]["type"], "database_error");
		assert_eq!(body["error"]["message"], "A database error occurred");
	}

	#[test]
	fn test_db_error_mapping() {
		assert!(matches!(
			ServerError::from(DbError::NotFound("voucher x".to_string())),
			ServerError::NotFound(_)
		));
		assert!(matches!(
			ServerError::from(DbError::Conflict("insufficient stock".to_string())),
			ServerError::Conflict(_)
		));
		let conflict = ServerError::from(DbError::Conflict("dup".to_string()));
		assert_eq!(conflict.error_type(), "integrity_error");
		assert_eq!(conflict.status(), StatusCode::CONFLICT);
	}

	#[tokio::test]
	async fn test_invalid_transition_is_business_rule() {
		let err = ServerError::from(DbError::Domain(DomainError::InvalidTransition {
			from: TransactionStatus::Paid,
			to: TransactionStatus::Cancelled,
		}));
		let (status, body) = body_json(err).await;
		assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(body["error"]["type"], "business_rule_violation");
		assert_eq!(body["error"]["details"]["from"], "paid");
		assert_eq!(body["error"]["details"]["to"], "cancelled");
	}

	#[tokio::test]
	async fn test_voucher_rejection_carries_reason() {
		let err = ServerError::from(DomainError::VoucherRejected(VoucherRejection::MinimumNotMet {
			required: 50_000,
		}));
		let (status, body) = body_json(err).await;
		assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(body["error"]["details"]["reason"], "minimum_not_met");
		assert_eq!(body["error"]["details"]["required"], 50_000);
	}
}
