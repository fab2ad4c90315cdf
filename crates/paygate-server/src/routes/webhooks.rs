// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Gateway notification intake and callback administration.

use axum::{
	body::Bytes,
	extract::State,
	http::{header, HeaderMap},
	Json,
};
use paygate_common_webhook::{compute_signature, verify_signature_header, SIGNATURE_HEADER};
use paygate_core::GatewayCallback;
use paygate_server_api::{
	ErrorResponse, ListParams, WebhookProcessedResponse, WebhookTestRequest, WebhookTestResponse,
};
use paygate_server_db::{time, Page, CALLBACK_FILTER};
use tracing::instrument;

use crate::{
	api::AppState,
	error::{Result, ServerError},
	extract::{ApiJson, ApiPath, ApiQuery},
	pagination::list_query,
	services::webhook::{self, Delivery},
};

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
	headers
		.get(name)
		.and_then(|v| v.to_str().ok())
		.map(str::trim)
		.filter(|v| !v.is_empty())
		.map(str::to_string)
}

/// First hop of `X-Forwarded-For`, else `X-Real-IP`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
	header_str(headers, "x-forwarded-for")
		.and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
		.filter(|ip| !ip.is_empty())
		.or_else(|| header_str(headers, "x-real-ip"))
}

fn delivery(headers: &HeaderMap, body: Bytes) -> Delivery {
	Delivery {
		body: body.to_vec(),
		signature: header_str(headers, SIGNATURE_HEADER),
		ip_address: client_ip(headers),
		user_agent: header_str(headers, header::USER_AGENT.as_str()),
	}
}

#[utoipa::path(
	post,
	path = "/webhooks/{gateway_code}",
	params(("gateway_code" = String, Path, description = "Gateway code, e.g. midtrans")),
	request_body(content = serde_json::Value, description = "Gateway-specific notification payload"),
	responses(
		(status = 200, description = "Notification applied", body = WebhookProcessedResponse),
		(status = 400, description = "Malformed payload", body = ErrorResponse),
		(status = 401, description = "Missing or invalid signature", body = ErrorResponse),
		(status = 404, description = "Unknown gateway", body = ErrorResponse),
		(status = 422, description = "Notification could not be applied", body = ErrorResponse)
	),
	tag = "webhooks"
)]
#[instrument(skip(state, headers, body))]
pub async fn receive_webhook(
	State(state): State<AppState>,
	ApiPath(gateway_code): ApiPath<String>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Json<WebhookProcessedResponse>> {
	let (callback, transaction) = webhook::receive(
		&state.writer,
		&gateway_code,
		delivery(&headers, body),
		state.config.payments.require_webhook_signature,
		time::now(),
	)
	.await?;

	Ok(Json(WebhookProcessedResponse {
		callback_id: callback.id,
		transaction_id: transaction.id,
		status: transaction.status,
	}))
}

#[utoipa::path(
	post,
	path = "/webhooks/test",
	request_body = WebhookTestRequest,
	responses(
		(status = 200, description = "Expected signature for the payload", body = WebhookTestResponse),
		(status = 422, description = "Empty secret", body = ErrorResponse)
	),
	tag = "webhooks"
)]
#[instrument(skip(request))]
pub async fn test_signature(
	ApiJson(request): ApiJson<WebhookTestRequest>,
) -> Result<Json<WebhookTestResponse>> {
	if request.secret.is_empty() {
		return Err(ServerError::validation("secret must not be empty"));
	}
	let body = serde_json::to_vec(&request.payload)
		.map_err(|e| ServerError::Internal(format!("failed to serialize payload: {e}")))?;
	let secret = request.secret.as_bytes();

	Ok(Json(WebhookTestResponse {
		expected_signature: compute_signature(secret, &body),
		valid: request
			.signature
			.as_deref()
			.map(|sig| verify_signature_header(secret, &body, sig)),
	}))
}

#[utoipa::path(
	get,
	path = "/webhooks/logs",
	params(ListParams),
	responses(
		(status = 200, description = "Page of stored callbacks", body = Page<GatewayCallback>),
		(status = 400, description = "Invalid criteria or sort", body = ErrorResponse)
	),
	tag = "webhooks"
)]
#[instrument(skip(state))]
pub async fn list_callbacks(
	State(state): State<AppState>,
	ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<Page<GatewayCallback>>> {
	let query = list_query(&params, &CALLBACK_FILTER)?;
	Ok(Json(state.reader.callbacks.list(&query).await?))
}

#[utoipa::path(
	post,
	path = "/webhooks/callbacks/{id}/retry",
	params(("id" = String, Path, description = "Callback ID")),
	responses(
		(status = 200, description = "Callback applied", body = WebhookProcessedResponse),
		(status = 401, description = "Callback has no valid signature", body = ErrorResponse),
		(status = 404, description = "Callback not found", body = ErrorResponse),
		(status = 409, description = "Callback already processed", body = ErrorResponse),
		(status = 422, description = "Notification could not be applied", body = ErrorResponse)
	),
	tag = "webhooks"
)]
#[instrument(skip(state))]
pub async fn retry_callback(
	State(state): State<AppState>,
	ApiPath(id): ApiPath<String>,
) -> Result<Json<WebhookProcessedResponse>> {
	let (callback, transaction) = webhook::retry(
		&state.writer,
		&id,
		state.config.payments.require_webhook_signature,
	)
	.await?;

	Ok(Json(WebhookProcessedResponse {
		callback_id: callback.id,
		transaction_id: transaction.id,
		status: transaction.status,
	}))
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::http::HeaderValue;

	#[test]
	fn test_client_ip_takes_first_forwarded_hop() {
		let mut headers = HeaderMap::new();
		headers.insert(
			"x-forwarded-for",
			HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
		);
		headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
		assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
	}

	#[test]
	fn test_client_ip_falls_back_to_real_ip() {
		let mut headers = HeaderMap::new();
		headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
		assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.2"));
		assert_eq!(client_ip(&HeaderMap::new()), None);
	}

	#[test]
	fn test_delivery_reads_signature_and_agent() {
		let mut headers = HeaderMap::new();
		headers.insert(SIGNATURE_HEADER, HeaderValue::from_static("sha256=abcd"));
		headers.insert(header::USER_AGENT, HeaderValue::from_static("Veritrans"));
		let d = delivery(&headers, Bytes::from_static(b"{}"));
		assert_eq!(d.signature.as_deref(), Some("sha256=abcd"));
		assert_eq!(d.user_agent.as_deref(), Some("Veritrans"));
		assert_eq!(d.body, b"{}");
		assert!(d.ip_address.is_none());
	}

	#[tokio::test]
	async fn test_signature_endpoint_matches_compact_json() {
		let payload = serde_json::json!({"order_id": "INV/1", "transaction_status": "settlement"});
		let body = serde_json::to_vec(&payload).unwrap();
		let sig = compute_signature(b"s3cret", &body);

		let Json(resp) = test_signature(ApiJson(WebhookTestRequest {
			secret: "s3cret".to_string(),
			payload: payload.clone(),
			signature: Some(format!("sha256={sig}")),
		}))
		.await
		.unwrap();
		assert_eq!(resp.expected_signature, sig);
		assert_eq!(resp.valid, Some(true));

		let Json(resp) = test_signature(ApiJson(WebhookTestRequest {
			secret: "s3cret".to_string(),
			payload,
			signature: Some("deadbeef".to_string()),
		}))
		.await
		.unwrap();
		assert_eq!(resp.valid, Some(false));
	}

	#[tokio::test]
	async fn test_signature_endpoint_rejects_empty_secret() {
		let err = test_signature(ApiJson(WebhookTestRequest {
			secret: String::new(),
			payload: serde_json::json!({}),
			signature: None,
		}))
		.await
		.unwrap_err();
		assert!(matches!(err, ServerError::Validation { .. }));
	}
}
