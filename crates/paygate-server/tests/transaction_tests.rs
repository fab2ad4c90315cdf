// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Checkout, status history and cancellation over HTTP.

mod common;

use axum::http::StatusCode;
use common::{error_type, setup, TestApp};
use serde_json::{json, Value};

async fn create_fixed_voucher(app: &TestApp, code: &str, min_transaction: i64) -> Value {
	let res = app
		.post(
			"/vouchers",
			json!({
				"application_id": app.fixture.application.id,
				"voucher_code": code,
				"voucher_name": "Five thousand off",
				"discount_type": "fixed",
				"discount_value": 5000.0,
				"min_transaction": min_transaction,
			}),
		)
		.await;
	assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
	res.body
}

#[tokio::test]
async fn test_checkout_creates_pending_transaction() {
	let app = setup().await;
	let res = app.checkout(2, None).await;

	assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
	assert_eq!(res.body["status"], "pending");
	assert_eq!(res.body["subtotal"], 30000);
	assert_eq!(res.body["discount_amount"], 0);
	assert_eq!(res.body["admin_fee"], 4000);
	assert_eq!(res.body["total_amount"], 34000);
	assert_eq!(res.body["currency"], "IDR");
	assert_eq!(res.body["gateway_id"], app.fixture.gateway.id.as_str());
	assert!(res.body["expired_at"].is_string());
	assert_eq!(res.body["items"][0]["quantity"], 2);
	assert_eq!(res.body["items"][0]["unit_price"], 15000);

	let product = app.get(&format!("/products/{}", app.fixture.product.id)).await;
	assert_eq!(product.body["stock"], 48);
}

#[tokio::test]
async fn test_checkout_applies_voucher_before_fee() {
	let app = setup().await;
	let voucher = create_fixed_voucher(&app, "HEMAT5K", 0).await;

	let res = app.checkout(2, Some("HEMAT5K")).await;
	assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
	assert_eq!(res.body["discount_amount"], 5000);
	assert_eq!(res.body["total_amount"], 29000);
	assert_eq!(res.body["voucher_id"], voucher["id"]);

	let voucher = app.get(&format!("/vouchers/{}", voucher["id"].as_str().unwrap())).await;
	assert_eq!(voucher.body["usage_count"], 1);
}

#[tokio::test]
async fn test_rejected_voucher_returns_reason() {
	let app = setup().await;
	create_fixed_voucher(&app, "BIGSPENDER", 1_000_000).await;

	let res = app.checkout(1, Some("BIGSPENDER")).await;
	assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
	assert_eq!(error_type(&res), "business_rule_violation");
	assert_eq!(res.body["error"]["details"]["reason"], "minimum_not_met");

	let product = app.get(&format!("/products/{}", app.fixture.product.id)).await;
	assert_eq!(product.body["stock"], 50);
}

#[tokio::test]
async fn test_checkout_validation_errors() {
	let app = setup().await;

	let res = app.checkout(51, None).await;
	assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);

	let res = app.checkout(0, None).await;
	assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
	assert_eq!(error_type(&res), "validation_error");

	let res = app.checkout(1, Some("NOPE")).await;
	assert_eq!(res.status, StatusCode::NOT_FOUND);

	let res = app
		.post("/transactions", json!({"application_id": "x"}))
		.await;
	assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
	assert_eq!(error_type(&res), "validation_error");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
	let app = setup().await;
	let res = app
		.send(
			axum::http::Request::builder()
				.method("POST")
				.uri("/transactions")
				.header("content-type", "application/json")
				.body(axum::body::Body::from("{not json"))
				.unwrap(),
		)
		.await;
	assert_eq!(res.status, StatusCode::BAD_REQUEST);
	assert_eq!(error_type(&res), "bad_request");
}

#[tokio::test]
async fn test_get_transaction_with_items_and_list() {
	let app = setup().await;
	let created = app.checkout(1, None).await;
	let id = created.body["id"].as_str().unwrap();

	let res = app.get(&format!("/transactions/{id}")).await;
	assert_eq!(res.status, StatusCode::OK);
	assert_eq!(res.body["invoice_number"], created.body["invoice_number"]);
	assert_eq!(res.body["items"].as_array().unwrap().len(), 1);

	let res = app.get("/transactions?criteria=status:pending").await;
	assert_eq!(res.status, StatusCode::OK);
	assert_eq!(res.body["metas"]["total"], 1);

	let res = app.get("/transactions?criteria=status:settlement").await;
	assert_eq!(res.body["metas"]["total"], 0);

	let res = app.get("/transactions/missing").await;
	assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_records_history() {
	let app = setup().await;
	let created = app.checkout(1, None).await;
	let id = created.body["id"].as_str().unwrap();

	let res = app
		.post(
			&format!("/transactions/{id}/cancel"),
			json!({"notes": "changed my mind"}),
		)
		.await;
	assert_eq!(res.status, StatusCode::OK, "{}", res.body);
	assert_eq!(res.body["status"], "cancelled");

	// Cancelling twice is a no-op.
	let res = app
		.post(&format!("/transactions/{id}/cancel"), json!({}))
		.await;
	assert_eq!(res.status, StatusCode::OK);

	let res = app.get(&format!("/transactions/{id}/logs")).await;
	assert_eq!(res.status, StatusCode::OK);
	let logs = res.body.as_array().unwrap();
	assert_eq!(logs.len(), 2);
	assert_eq!(logs[0]["new_status"], "pending");
	assert_eq!(logs[1]["previous_status"], "pending");
	assert_eq!(logs[1]["new_status"], "cancelled");
	assert_eq!(logs[1]["changed_by"], "user");
	assert_eq!(logs[1]["notes"], "changed my mind");

	let res = app.get("/transactions/missing/logs").await;
	assert_eq!(res.status, StatusCode::NOT_FOUND);
}
