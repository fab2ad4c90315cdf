// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Payment method HTTP handlers.

use axum::{extract::State, Json};
use paygate_core::PaymentMethod;
use paygate_server_api::{
	CalculateFeeRequest, CalculateFeeResponse, ErrorResponse, PaymentMethodResponse,
	PaymentMethodsQuery,
};
use tracing::instrument;

use crate::{
	api::AppState,
	error::{Result, ServerError},
	extract::{ApiJson, ApiPath, ApiQuery},
};

async fn load_method(state: &AppState, id: &str) -> Result<PaymentMethod> {
	state
		.reader
		.payment_methods
		.get_method(id)
		.await?
		.ok_or_else(|| ServerError::not_found("Payment method"))
}

#[utoipa::path(
	get,
	path = "/payment-methods",
	params(PaymentMethodsQuery),
	responses(
		(status = 200, description = "Active payment methods", body = Vec<PaymentMethodResponse>),
		(status = 400, description = "Invalid amount", body = ErrorResponse)
	),
	tag = "payment-methods"
)]
#[instrument(skip(state))]
pub async fn list_payment_methods(
	State(state): State<AppState>,
	ApiQuery(query): ApiQuery<PaymentMethodsQuery>,
) -> Result<Json<Vec<PaymentMethodResponse>>> {
	if query.amount.is_some_and(|a| a < 0) {
		return Err(ServerError::BadRequest("amount must not be negative".to_string()));
	}
	let methods = state.reader.payment_methods.list_active_methods().await?;
	let response = methods
		.into_iter()
		.map(|method| PaymentMethodResponse {
			admin_fee_amount: query.amount.map(|amount| method.fee().compute(amount)),
			method,
		})
		.collect();
	Ok(Json(response))
}

#[utoipa::path(
	get,
	path = "/payment-methods/{id}",
	params(("id" = String, Path, description = "Payment method ID")),
	responses(
		(status = 200, description = "Payment method", body = PaymentMethod),
		(status = 404, description = "Payment method not found", body = ErrorResponse)
	),
	tag = "payment-methods"
)]
#[instrument(skip(state))]
pub async fn get_payment_method(
	State(state): State<AppState>,
	ApiPath(id): ApiPath<String>,
) -> Result<Json<PaymentMethod>> {
	Ok(Json(load_method(&state, &id).await?))
}

#[utoipa::path(
	post,
	path = "/payment-methods/{id}/calculate-fee",
	params(("id" = String, Path, description = "Payment method ID")),
	request_body = CalculateFeeRequest,
	responses(
		(status = 200, description = "Fee for the amount", body = CalculateFeeResponse),
		(status = 400, description = "Negative amount", body = ErrorResponse),
		(status = 404, description = "Payment method not found", body = ErrorResponse),
		(status = 422, description = "Payment method is inactive", body = ErrorResponse)
	),
	tag = "payment-methods"
)]
#[instrument(skip(state, request), fields(amount = request.amount))]
pub async fn calculate_fee(
	State(state): State<AppState>,
	ApiPath(id): ApiPath<String>,
	ApiJson(request): ApiJson<CalculateFeeRequest>,
) -> Result<Json<CalculateFeeResponse>> {
	if request.amount < 0 {
		return Err(ServerError::BadRequest("amount must not be negative".to_string()));
	}
	let method = load_method(&state, &id).await?;
	if !method.is_active {
		return Err(ServerError::business_rule(format!(
			"payment method {} is not active",
			method.method_code
		)));
	}

	let admin_fee = method.fee().compute(request.amount);
	let total = request
		.amount
		.checked_add(admin_fee)
		.ok_or_else(|| ServerError::validation("amount is too large"))?;
	Ok(Json(CalculateFeeResponse {
		payment_method_id: method.id,
		amount: request.amount,
		admin_fee,
		total,
	}))
}
