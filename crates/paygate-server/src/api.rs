// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application state and router assembly.

use std::sync::Arc;

use axum::{
	middleware::from_fn,
	routing::{get, post},
	Json, Router,
};
use paygate_server_config::ServerConfig;
use paygate_server_db::{
	ApplicationRepository, CallbackRepository, DatabaseManager, DbError, PaymentMethodRepository,
	ProductRepository, SqlitePool, TransactionRepository, VoucherRepository,
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::{api_docs::ApiDoc, cors::cors_layer, request_id::request_id_layer, routes};

/// One repository per aggregate, all bound to the same pool.
#[derive(Clone)]
pub struct Repositories {
	pub applications: ApplicationRepository,
	pub products: ProductRepository,
	pub payment_methods: PaymentMethodRepository,
	pub vouchers: VoucherRepository,
	pub transactions: TransactionRepository,
	pub callbacks: CallbackRepository,
}

impl Repositories {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			applications: ApplicationRepository::new(pool.clone()),
			products: ProductRepository::new(pool.clone()),
			payment_methods: PaymentMethodRepository::new(pool.clone()),
			vouchers: VoucherRepository::new(pool.clone()),
			transactions: TransactionRepository::new(pool.clone()),
			callbacks: CallbackRepository::new(pool),
		}
	}
}

#[derive(Clone)]
pub struct AppState {
	pub config: Arc<ServerConfig>,
	pub databases: Arc<DatabaseManager>,
	/// Bound to the replica when one is configured.
	pub reader: Repositories,
	pub writer: Repositories,
}

/// Build state from an initialized [`DatabaseManager`].
pub fn create_app_state(
	config: ServerConfig,
	databases: Arc<DatabaseManager>,
) -> Result<AppState, DbError> {
	let writer = Repositories::new(databases.primary()?);
	let reader = Repositories::new(databases.reader()?);
	Ok(AppState {
		config: Arc::new(config),
		databases,
		reader,
		writer,
	})
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
	Json(ApiDoc::openapi())
}

pub fn create_router(state: AppState) -> Router {
	let cors = cors_layer(&state.config.cors);

	Router::new()
		.route("/health", get(routes::health::health_check))
		.route("/api-docs/openapi.json", get(openapi_json))
		// Payment methods
		.route(
			"/payment-methods",
			get(routes::payment_methods::list_payment_methods),
		)
		.route(
			"/payment-methods/{id}",
			get(routes::payment_methods::get_payment_method),
		)
		.route(
			"/payment-methods/{id}/calculate-fee",
			post(routes::payment_methods::calculate_fee),
		)
		// Products
		.route("/products", get(routes::products::list_products))
		.route("/products/{id}", get(routes::products::get_product))
		// Transactions
		.route(
			"/transactions",
			get(routes::transactions::list_transactions).post(routes::transactions::checkout),
		)
		.route(
			"/transactions/{id}",
			get(routes::transactions::get_transaction),
		)
		.route(
			"/transactions/{id}/logs",
			get(routes::transactions::get_transaction_logs),
		)
		.route(
			"/transactions/{id}/cancel",
			post(routes::transactions::cancel_transaction),
		)
		// Vouchers
		.route(
			"/vouchers",
			get(routes::vouchers::list_vouchers).post(routes::vouchers::create_voucher),
		)
		.route("/vouchers/public", get(routes::vouchers::list_public_vouchers))
		.route("/vouchers/my-vouchers", get(routes::vouchers::my_vouchers))
		.route(
			"/vouchers/{id}",
			get(routes::vouchers::get_voucher).put(routes::vouchers::update_voucher),
		)
		.route(
			"/vouchers/{id}/eligible-users",
			post(routes::vouchers::add_eligible_users),
		)
		.route(
			"/vouchers/{id}/conditions",
			get(routes::vouchers::list_conditions).post(routes::vouchers::add_condition),
		)
		.route(
			"/vouchers/{id}/validate",
			post(routes::vouchers::validate_voucher),
		)
		.route("/vouchers/{id}/claim", post(routes::vouchers::claim_voucher))
		// Webhooks
		.route("/webhooks/test", post(routes::webhooks::test_signature))
		.route("/webhooks/logs", get(routes::webhooks::list_callbacks))
		.route(
			"/webhooks/callbacks/{id}/retry",
			post(routes::webhooks::retry_callback),
		)
		.route(
			"/webhooks/{gateway_code}",
			post(routes::webhooks::receive_webhook),
		)
		.with_state(state)
		.layer(TraceLayer::new_for_http())
		.layer(cors)
		.layer(from_fn(request_id_layer))
}
