// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared setup for HTTP integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
	body::Body,
	http::{header::CONTENT_TYPE, HeaderMap, Method, Request, StatusCode},
	Router,
};
use paygate_common_webhook::{compute_signature, SIGNATURE_HEADER};
use paygate_server::{create_app_state, create_router, AppState, ServerConfig};
use paygate_server_config::DatabaseConnectionConfig;
use paygate_server_db::{testing, DatabaseManager};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const WEBHOOK_SECRET: &str = "whsec_integration";

pub struct TestApp {
	pub router: Router,
	pub state: AppState,
	pub fixture: testing::CheckoutFixture,
	_dir: TempDir,
}

pub struct TestResponse {
	pub status: StatusCode,
	pub headers: HeaderMap,
	pub body: Value,
}

/// App over a migrated, file-backed database seeded with the checkout fixture
/// and a webhook secret for the fixture gateway.
pub async fn setup() -> TestApp {
	setup_with(|_| {}).await
}

pub async fn setup_with(configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
	let dir = tempfile::tempdir().unwrap();
	let mut config = ServerConfig::default();
	config.database.primary = DatabaseConnectionConfig {
		path: Some(dir.path().join("paygate.db").display().to_string()),
		..DatabaseConnectionConfig::default()
	};
	configure(&mut config);

	let mut databases = DatabaseManager::from_config(&config.database).unwrap();
	databases.initialize().await.unwrap();
	databases.upgrade_all().await.unwrap();

	let pool = databases.primary().unwrap();
	let fixture = testing::seed_checkout(&pool).await;
	paygate_server_db::PaymentMethodRepository::new(pool)
		.upsert_credential(&testing::credential(
			&fixture.application.id,
			&fixture.gateway.id,
			Some(WEBHOOK_SECRET),
		))
		.await
		.unwrap();

	let state = create_app_state(config, Arc::new(databases)).unwrap();
	TestApp {
		router: create_router(state.clone()),
		state,
		fixture,
		_dir: dir,
	}
}

impl TestApp {
	pub async fn send(&self, request: Request<Body>) -> TestResponse {
		let response = self.router.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let headers = response.headers().clone();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		let body = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap_or(Value::Null)
		};
		TestResponse {
			status,
			headers,
			body,
		}
	}

	pub async fn get(&self, uri: &str) -> TestResponse {
		self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
			.await
	}

	pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
		self.json(Method::POST, uri, body).await
	}

	pub async fn put(&self, uri: &str, body: Value) -> TestResponse {
		self.json(Method::PUT, uri, body).await
	}

	pub async fn json(&self, method: Method, uri: &str, body: Value) -> TestResponse {
		self.send(
			Request::builder()
				.method(method)
				.uri(uri)
				.header(CONTENT_TYPE, "application/json")
				.body(Body::from(serde_json::to_vec(&body).unwrap()))
				.unwrap(),
		)
		.await
	}

	/// Deliver a gateway notification, signed with `secret` when given.
	pub async fn webhook(&self, gateway_code: &str, payload: &Value, secret: Option<&str>) -> TestResponse {
		let body = serde_json::to_vec(payload).unwrap();
		let mut request = Request::builder()
			.method(Method::POST)
			.uri(format!("/webhooks/{gateway_code}"))
			.header(CONTENT_TYPE, "application/json")
			.header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
			.header("user-agent", "Veritrans");
		if let Some(secret) = secret {
			request = request.header(
				SIGNATURE_HEADER,
				format!("sha256={}", compute_signature(secret.as_bytes(), &body)),
			);
		}
		self.send(request.body(Body::from(body)).unwrap()).await
	}

	/// Checkout `quantity` of the fixture product with the fixture payment method.
	pub async fn checkout(&self, quantity: i64, voucher_code: Option<&str>) -> TestResponse {
		self.post(
			"/transactions",
			serde_json::json!({
				"application_id": self.fixture.application.id,
				"user_id": self.fixture.user_id,
				"items": [{"product_id": self.fixture.product.id, "quantity": quantity}],
				"payment_method_id": self.fixture.method.id,
				"voucher_code": voucher_code,
			}),
		)
		.await
	}
}

/// Asserts the error envelope and returns its `type`.
pub fn error_type(response: &TestResponse) -> &str {
	let error = &response.body["error"];
	assert!(error["message"].is_string(), "not an error envelope: {}", response.body);
	assert!(error["request_id"].is_string());
	error["type"].as_str().unwrap()
}
