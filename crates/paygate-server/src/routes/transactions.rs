// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Transaction HTTP handlers.

use axum::{extract::State, http::StatusCode, Json};
use paygate_core::{ChangedBy, Transaction, TransactionLog, TransactionStatus};
use paygate_server_api::{
	CancelTransactionRequest, CheckoutRequest, ErrorResponse, ListParams, TransactionResponse,
};
use paygate_server_db::{time, Page, TRANSACTION_FILTER};
use tracing::instrument;

use crate::{
	api::AppState,
	error::{Result, ServerError},
	extract::{ApiJson, ApiPath, ApiQuery},
	pagination::list_query,
	services::checkout as checkout_service,
};

#[utoipa::path(
	get,
	path = "/transactions",
	params(ListParams),
	responses(
		(status = 200, description = "Page of transactions", body = Page<Transaction>),
		(status = 400, description = "Invalid criteria or sort", body = ErrorResponse)
	),
	tag = "transactions"
)]
#[instrument(skip(state))]
pub async fn list_transactions(
	State(state): State<AppState>,
	ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<Page<Transaction>>> {
	let query = list_query(&params, &TRANSACTION_FILTER)?;
	Ok(Json(state.reader.transactions.list(&query).await?))
}

#[utoipa::path(
	post,
	path = "/transactions",
	request_body = CheckoutRequest,
	responses(
		(status = 201, description = "Transaction created", body = TransactionResponse),
		(status = 404, description = "Application, product, payment method or voucher not found", body = ErrorResponse),
		(status = 409, description = "Stock or voucher usage ran out", body = ErrorResponse),
		(status = 422, description = "Cart or voucher rejected", body = ErrorResponse)
	),
	tag = "transactions"
)]
#[instrument(skip(state, request), fields(application_id = %request.application_id, user_id = %request.user_id))]
pub async fn checkout(
	State(state): State<AppState>,
	ApiJson(request): ApiJson<CheckoutRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>)> {
	let outcome =
		checkout_service::checkout(&state.writer, &state.config.payments, request, time::now())
			.await?;
	Ok((
		StatusCode::CREATED,
		Json(TransactionResponse {
			transaction: outcome.transaction,
			items: outcome.items,
		}),
	))
}

#[utoipa::path(
	get,
	path = "/transactions/{id}",
	params(("id" = String, Path, description = "Transaction ID")),
	responses(
		(status = 200, description = "Transaction with items", body = TransactionResponse),
		(status = 404, description = "Transaction not found", body = ErrorResponse)
	),
	tag = "transactions"
)]
#[instrument(skip(state))]
pub async fn get_transaction(
	State(state): State<AppState>,
	ApiPath(id): ApiPath<String>,
) -> Result<Json<TransactionResponse>> {
	let transaction = state
		.reader
		.transactions
		.get(&id)
		.await?
		.ok_or_else(|| ServerError::not_found("Transaction"))?;
	let items = state.reader.transactions.items(&id).await?;
	Ok(Json(TransactionResponse { transaction, items }))
}

#[utoipa::path(
	get,
	path = "/transactions/{id}/logs",
	params(("id" = String, Path, description = "Transaction ID")),
	responses(
		(status = 200, description = "Status history, oldest first", body = Vec<TransactionLog>),
		(status = 404, description = "Transaction not found", body = ErrorResponse)
	),
	tag = "transactions"
)]
#[instrument(skip(state))]
pub async fn get_transaction_logs(
	State(state): State<AppState>,
	ApiPath(id): ApiPath<String>,
) -> Result<Json<Vec<TransactionLog>>> {
	if state.reader.transactions.get(&id).await?.is_none() {
		return Err(ServerError::not_found("Transaction"));
	}
	Ok(Json(state.reader.transactions.logs(&id).await?))
}

#[utoipa::path(
	post,
	path = "/transactions/{id}/cancel",
	params(("id" = String, Path, description = "Transaction ID")),
	request_body = CancelTransactionRequest,
	responses(
		(status = 200, description = "Transaction cancelled", body = Transaction),
		(status = 404, description = "Transaction not found", body = ErrorResponse),
		(status = 422, description = "Transaction can no longer be cancelled", body = ErrorResponse)
	),
	tag = "transactions"
)]
#[instrument(skip(state, request))]
pub async fn cancel_transaction(
	State(state): State<AppState>,
	ApiPath(id): ApiPath<String>,
	ApiJson(request): ApiJson<CancelTransactionRequest>,
) -> Result<Json<Transaction>> {
	let notes = request.notes.as_deref().unwrap_or("cancelled by user");
	let (transaction, _) = state
		.writer
		.transactions
		.transition(
			&id,
			TransactionStatus::Cancelled,
			ChangedBy::User,
			None,
			Some(notes),
		)
		.await?;
	Ok(Json(transaction))
}
