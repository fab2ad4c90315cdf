// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Product catalog HTTP handlers.

use axum::{extract::State, Json};
use paygate_core::Product;
use paygate_server_api::{ErrorResponse, ListParams};
use paygate_server_db::{Page, PRODUCT_FILTER};
use tracing::instrument;

use crate::{
	api::AppState,
	error::{Result, ServerError},
	extract::{ApiPath, ApiQuery},
	pagination::list_query,
};

#[utoipa::path(
	get,
	path = "/products",
	params(ListParams),
	responses(
		(status = 200, description = "Page of products", body = Page<Product>),
		(status = 400, description = "Invalid criteria or sort", body = ErrorResponse)
	),
	tag = "products"
)]
#[instrument(skip(state))]
pub async fn list_products(
	State(state): State<AppState>,
	ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<Page<Product>>> {
	let query = list_query(&params, &PRODUCT_FILTER)?;
	Ok(Json(state.reader.products.list(&query).await?))
}

#[utoipa::path(
	get,
	path = "/products/{id}",
	params(("id" = String, Path, description = "Product ID")),
	responses(
		(status = 200, description = "Product", body = Product),
		(status = 404, description = "Product not found", body = ErrorResponse)
	),
	tag = "products"
)]
#[instrument(skip(state))]
pub async fn get_product(
	State(state): State<AppState>,
	ApiPath(id): ApiPath<String>,
) -> Result<Json<Product>> {
	state
		.reader
		.products
		.get(&id)
		.await?
		.map(Json)
		.ok_or_else(|| ServerError::not_found("Product"))
}
