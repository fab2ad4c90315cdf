// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Voucher HTTP handlers.

use axum::{extract::State, http::StatusCode, Json};
use paygate_core::{DiscountType, Voucher, VoucherCondition, VoucherEligibleUser};
use paygate_server_api::{
	ClaimVoucherRequest, CreateConditionRequest, CreateVoucherRequest, EligibleUsersRequest,
	EligibleUsersResponse, ErrorResponse, ListParams, MyVouchersQuery, UpdateVoucherRequest,
	ValidateVoucherRequest, ValidateVoucherResponse,
};
use paygate_server_db::{time, Page, VoucherUpdate, VOUCHER_FILTER};
use tracing::instrument;
use uuid::Uuid;

use crate::{
	api::AppState,
	error::{Result, ServerError},
	extract::{ApiJson, ApiPath, ApiQuery},
	pagination::list_query,
	services::vouchers::{self, VoucherCheck},
};

fn check_discount(discount_type: DiscountType, value: f64, max_discount: Option<i64>) -> Result<()> {
	if !value.is_finite() || value < 0.0 {
		return Err(ServerError::validation("discount_value must not be negative"));
	}
	if discount_type == DiscountType::Percentage && value > 100.0 {
		return Err(ServerError::validation(
			"percentage discount_value must not exceed 100",
		));
	}
	if max_discount.is_some_and(|m| m < 0) {
		return Err(ServerError::validation("max_discount must not be negative"));
	}
	Ok(())
}

async fn load_voucher(state: &AppState, id: &str) -> Result<Voucher> {
	state
		.reader
		.vouchers
		.get(id)
		.await?
		.ok_or_else(|| ServerError::not_found("Voucher"))
}

#[utoipa::path(
	get,
	path = "/vouchers",
	params(ListParams),
	responses(
		(status = 200, description = "Page of vouchers", body = Page<Voucher>),
		(status = 400, description = "Invalid criteria or sort", body = ErrorResponse)
	),
	tag = "vouchers"
)]
#[instrument(skip(state))]
pub async fn list_vouchers(
	State(state): State<AppState>,
	ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<Page<Voucher>>> {
	let query = list_query(&params, &VOUCHER_FILTER)?;
	Ok(Json(state.reader.vouchers.list(&query).await?))
}

#[utoipa::path(
	post,
	path = "/vouchers",
	request_body = CreateVoucherRequest,
	responses(
		(status = 201, description = "Voucher created", body = Voucher),
		(status = 404, description = "Application not found", body = ErrorResponse),
		(status = 409, description = "Voucher code already exists", body = ErrorResponse),
		(status = 422, description = "Invalid voucher", body = ErrorResponse)
	),
	tag = "vouchers"
)]
#[instrument(skip(state, request), fields(voucher_code = %request.voucher_code))]
pub async fn create_voucher(
	State(state): State<AppState>,
	ApiJson(request): ApiJson<CreateVoucherRequest>,
) -> Result<(StatusCode, Json<Voucher>)> {
	let voucher_code = request.voucher_code.trim().to_string();
	if voucher_code.is_empty() {
		return Err(ServerError::validation("voucher_code must not be empty"));
	}
	check_discount(request.discount_type, request.discount_value, request.max_discount)?;
	if let (Some(from), Some(until)) = (request.valid_from, request.valid_until) {
		if until < from {
			return Err(ServerError::validation("valid_until must not precede valid_from"));
		}
	}
	if state
		.writer
		.applications
		.get(&request.application_id)
		.await?
		.is_none()
	{
		return Err(ServerError::not_found("Application"));
	}

	let now = time::now();
	let voucher = Voucher {
		id: Uuid::new_v4().to_string(),
		application_id: request.application_id,
		voucher_code,
		voucher_name: request.voucher_name,
		description: request.description,
		voucher_type: request.voucher_type,
		discount_type: request.discount_type,
		discount_value: request.discount_value,
		max_discount: request.max_discount,
		min_transaction: request.min_transaction,
		usage_limit: request.usage_limit,
		usage_count: 0,
		usage_limit_per_user: request.usage_limit_per_user,
		valid_from: request.valid_from,
		valid_until: request.valid_until,
		is_active: request.is_active,
		is_auto_apply: request.is_auto_apply,
		applicable_products: request.applicable_products,
		created_at: now,
		updated_at: now,
	};
	state.writer.vouchers.create(&voucher).await?;
	tracing::info!(voucher_id = %voucher.id, voucher_code = %voucher.voucher_code, "voucher created");
	Ok((StatusCode::CREATED, Json(voucher)))
}

#[utoipa::path(
	get,
	path = "/vouchers/public",
	responses((status = 200, description = "Public vouchers usable now", body = Vec<Voucher>)),
	tag = "vouchers"
)]
#[instrument(skip(state))]
pub async fn list_public_vouchers(State(state): State<AppState>) -> Result<Json<Vec<Voucher>>> {
	Ok(Json(state.reader.vouchers.list_public(time::now()).await?))
}

#[utoipa::path(
	get,
	path = "/vouchers/my-vouchers",
	params(MyVouchersQuery),
	responses(
		(status = 200, description = "Vouchers granted to the user", body = Vec<Voucher>),
		(status = 400, description = "Missing user_id", body = ErrorResponse)
	),
	tag = "vouchers"
)]
#[instrument(skip(state))]
pub async fn my_vouchers(
	State(state): State<AppState>,
	ApiQuery(query): ApiQuery<MyVouchersQuery>,
) -> Result<Json<Vec<Voucher>>> {
	Ok(Json(
		state
			.reader
			.vouchers
			.list_user_vouchers(&query.user_id, time::now())
			.await?,
	))
}

#[utoipa::path(
	get,
	path = "/vouchers/{id}",
	params(("id" = String, Path, description = "Voucher ID")),
	responses(
		(status = 200, description = "Voucher", body = Voucher),
		(status = 404, description = "Voucher not found", body = ErrorResponse)
	),
	tag = "vouchers"
)]
#[instrument(skip(state))]
pub async fn get_voucher(
	State(state): State<AppState>,
	ApiPath(id): ApiPath<String>,
) -> Result<Json<Voucher>> {
	Ok(Json(load_voucher(&state, &id).await?))
}

#[utoipa::path(
	put,
	path = "/vouchers/{id}",
	params(("id" = String, Path, description = "Voucher ID")),
	request_body = UpdateVoucherRequest,
	responses(
		(status = 200, description = "Updated voucher", body = Voucher),
		(status = 404, description = "Voucher not found", body = ErrorResponse),
		(status = 422, description = "Invalid update", body = ErrorResponse)
	),
	tag = "vouchers"
)]
#[instrument(skip(state, request))]
pub async fn update_voucher(
	State(state): State<AppState>,
	ApiPath(id): ApiPath<String>,
	ApiJson(request): ApiJson<UpdateVoucherRequest>,
) -> Result<Json<Voucher>> {
	if request.discount_value.is_some() || request.max_discount.is_some() {
		let current = state
			.writer
			.vouchers
			.get(&id)
			.await?
			.ok_or_else(|| ServerError::not_found("Voucher"))?;
		check_discount(
			current.discount_type,
			request.discount_value.unwrap_or(current.discount_value),
			request.max_discount,
		)?;
	}

	let update = VoucherUpdate {
		voucher_name: request.voucher_name,
		description: request.description,
		discount_value: request.discount_value,
		max_discount: request.max_discount,
		min_transaction: request.min_transaction,
		usage_limit: request.usage_limit,
		usage_limit_per_user: request.usage_limit_per_user,
		valid_from: request.valid_from,
		valid_until: request.valid_until,
		is_active: request.is_active,
		is_auto_apply: request.is_auto_apply,
		applicable_products: request.applicable_products,
	};
	Ok(Json(state.writer.vouchers.update(&id, update).await?))
}

#[utoipa::path(
	post,
	path = "/vouchers/{id}/eligible-users",
	params(("id" = String, Path, description = "Voucher ID")),
	request_body = EligibleUsersRequest,
	responses(
		(status = 200, description = "Grants added", body = EligibleUsersResponse),
		(status = 404, description = "Voucher not found", body = ErrorResponse),
		(status = 422, description = "Invalid grant", body = ErrorResponse)
	),
	tag = "vouchers"
)]
#[instrument(skip(state, request), fields(users = request.user_ids.len()))]
pub async fn add_eligible_users(
	State(state): State<AppState>,
	ApiPath(id): ApiPath<String>,
	ApiJson(request): ApiJson<EligibleUsersRequest>,
) -> Result<Json<EligibleUsersResponse>> {
	if request.user_ids.iter().all(|u| u.trim().is_empty()) {
		return Err(ServerError::validation("user_ids must not be empty"));
	}
	let voucher = state
		.writer
		.vouchers
		.get(&id)
		.await?
		.ok_or_else(|| ServerError::not_found("Voucher"))?;
	if voucher.application_id != request.application_id {
		return Err(ServerError::validation(
			"voucher does not belong to the given application",
		));
	}

	let user_ids: Vec<String> = request
		.user_ids
		.iter()
		.map(|u| u.trim().to_string())
		.filter(|u| !u.is_empty())
		.collect();
	let inserted = state
		.writer
		.vouchers
		.add_eligible_users(
			&voucher.id,
			&request.application_id,
			&user_ids,
			request.expires_at,
			time::now(),
		)
		.await?;
	Ok(Json(EligibleUsersResponse { inserted }))
}

#[utoipa::path(
	get,
	path = "/vouchers/{id}/conditions",
	params(("id" = String, Path, description = "Voucher ID")),
	responses(
		(status = 200, description = "Voucher conditions", body = Vec<VoucherCondition>),
		(status = 404, description = "Voucher not found", body = ErrorResponse)
	),
	tag = "vouchers"
)]
#[instrument(skip(state))]
pub async fn list_conditions(
	State(state): State<AppState>,
	ApiPath(id): ApiPath<String>,
) -> Result<Json<Vec<VoucherCondition>>> {
	let voucher = load_voucher(&state, &id).await?;
	Ok(Json(state.reader.vouchers.list_conditions(&voucher.id).await?))
}

#[utoipa::path(
	post,
	path = "/vouchers/{id}/conditions",
	params(("id" = String, Path, description = "Voucher ID")),
	request_body = CreateConditionRequest,
	responses(
		(status = 201, description = "Condition added", body = VoucherCondition),
		(status = 404, description = "Voucher not found", body = ErrorResponse)
	),
	tag = "vouchers"
)]
#[instrument(skip(state, request), fields(condition_type = %request.condition_type))]
pub async fn add_condition(
	State(state): State<AppState>,
	ApiPath(id): ApiPath<String>,
	ApiJson(request): ApiJson<CreateConditionRequest>,
) -> Result<(StatusCode, Json<VoucherCondition>)> {
	if state.writer.vouchers.get(&id).await?.is_none() {
		return Err(ServerError::not_found("Voucher"));
	}
	let now = time::now();
	let condition = VoucherCondition {
		id: Uuid::new_v4().to_string(),
		voucher_id: id,
		condition_type: request.condition_type,
		operator: request.operator,
		condition_value: request.condition_value,
		is_required: request.is_required,
		created_at: now,
		updated_at: now,
	};
	state.writer.vouchers.add_condition(&condition).await?;
	Ok((StatusCode::CREATED, Json(condition)))
}

#[utoipa::path(
	post,
	path = "/vouchers/{id}/validate",
	params(("id" = String, Path, description = "Voucher ID")),
	request_body = ValidateVoucherRequest,
	responses(
		(status = 200, description = "Verdict for the described checkout", body = ValidateVoucherResponse),
		(status = 400, description = "Negative subtotal", body = ErrorResponse),
		(status = 404, description = "Voucher not found", body = ErrorResponse)
	),
	tag = "vouchers"
)]
#[instrument(skip(state, request), fields(user_id = %request.user_id, subtotal = request.subtotal))]
pub async fn validate_voucher(
	State(state): State<AppState>,
	ApiPath(id): ApiPath<String>,
	ApiJson(request): ApiJson<ValidateVoucherRequest>,
) -> Result<Json<ValidateVoucherResponse>> {
	if request.subtotal < 0 {
		return Err(ServerError::BadRequest("subtotal must not be negative".to_string()));
	}
	let voucher = load_voucher(&state, &id).await?;
	let category_ids = vouchers::categories_of(&state.reader, &request.product_ids).await?;
	let check = VoucherCheck {
		user_id: request.user_id,
		subtotal: request.subtotal,
		product_ids: request.product_ids,
		category_ids,
		payment_method_code: request.payment_method_code,
		user_segments: request.user_segments,
	};

	let response = match vouchers::evaluate(&state.reader, &voucher, check, time::now()).await? {
		Ok(discount_amount) => ValidateVoucherResponse {
			valid: true,
			discount_amount,
			reason: None,
			message: None,
		},
		Err(rejection) => ValidateVoucherResponse {
			valid: false,
			discount_amount: 0,
			reason: Some(rejection.code().to_string()),
			message: Some(rejection.to_string()),
		},
	};
	Ok(Json(response))
}

#[utoipa::path(
	post,
	path = "/vouchers/{id}/claim",
	params(("id" = String, Path, description = "Voucher ID")),
	request_body = ClaimVoucherRequest,
	responses(
		(status = 200, description = "Grant marked as claimed", body = VoucherEligibleUser),
		(status = 404, description = "User has no grant for this voucher", body = ErrorResponse),
		(status = 409, description = "Already claimed", body = ErrorResponse)
	),
	tag = "vouchers"
)]
#[instrument(skip(state, request), fields(user_id = %request.user_id))]
pub async fn claim_voucher(
	State(state): State<AppState>,
	ApiPath(id): ApiPath<String>,
	ApiJson(request): ApiJson<ClaimVoucherRequest>,
) -> Result<Json<VoucherEligibleUser>> {
	Ok(Json(
		state
			.writer
			.vouchers
			.claim(&id, &request.user_id, time::now())
			.await?,
	))
}
