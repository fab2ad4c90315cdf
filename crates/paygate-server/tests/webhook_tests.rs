// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Gateway notification intake over HTTP.

mod common;

use axum::{
	body::Body,
	http::{Request, StatusCode},
};
use common::{error_type, setup, WEBHOOK_SECRET};
use serde_json::{json, Value};

fn settlement(invoice: &Value) -> Value {
	json!({
		"order_id": invoice,
		"transaction_status": "settlement",
		"transaction_id": "mid-9f1c",
		"fraud_status": "accept",
	})
}

#[tokio::test]
async fn test_signed_notification_settles_transaction() {
	let app = setup().await;
	let trx = app.checkout(1, None).await.body;

	let res = app
		.webhook("midtrans", &settlement(&trx["invoice_number"]), Some(WEBHOOK_SECRET))
		.await;
	assert_eq!(res.status, StatusCode::OK, "{}", res.body);
	assert_eq!(res.body["transaction_id"], trx["id"]);
	assert_eq!(res.body["status"], "settlement");
	let callback_id = res.body["callback_id"].as_str().unwrap().to_string();

	let updated = app
		.get(&format!("/transactions/{}", trx["id"].as_str().unwrap()))
		.await;
	assert_eq!(updated.body["status"], "settlement");
	assert_eq!(updated.body["payment_reference"], "mid-9f1c");
	assert!(updated.body["paid_at"].is_string());

	let logs = app
		.get(&format!("/transactions/{}/logs", trx["id"].as_str().unwrap()))
		.await;
	let last = logs.body.as_array().unwrap().last().unwrap().clone();
	assert_eq!(last["changed_by"], "gateway");
	assert_eq!(last["gateway_callback_id"], callback_id.as_str());

	let stored = app.get("/webhooks/logs?criteria=is_processed:true").await;
	assert_eq!(stored.body["metas"]["total"], 1);
	assert_eq!(stored.body["data"][0]["ip_address"], "203.0.113.7");
	assert_eq!(stored.body["data"][0]["user_agent"], "Veritrans");

	// A settled transaction can no longer be cancelled by the user.
	let res = app
		.post(
			&format!("/transactions/{}/cancel", trx["id"].as_str().unwrap()),
			json!({}),
		)
		.await;
	assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
	assert_eq!(res.body["error"]["details"]["from"], "settlement");

	let res = app
		.post(&format!("/webhooks/callbacks/{callback_id}/retry"), json!({}))
		.await;
	assert_eq!(res.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_bad_signature_is_stored_and_rejected() {
	let app = setup().await;
	let trx = app.checkout(1, None).await.body;

	let res = app
		.webhook("midtrans", &settlement(&trx["invoice_number"]), Some("not-the-secret"))
		.await;
	assert_eq!(res.status, StatusCode::UNAUTHORIZED);
	assert_eq!(error_type(&res), "invalid_signature");

	let res = app
		.webhook("midtrans", &settlement(&trx["invoice_number"]), None)
		.await;
	assert_eq!(res.status, StatusCode::UNAUTHORIZED);

	let stored = app.get("/webhooks/logs?criteria=is_signature_valid:false").await;
	assert_eq!(stored.body["metas"]["total"], 2);
	let callback_id = stored.body["data"][0]["id"].as_str().unwrap().to_string();

	let res = app
		.post(&format!("/webhooks/callbacks/{callback_id}/retry"), json!({}))
		.await;
	assert_eq!(res.status, StatusCode::UNAUTHORIZED);

	let unchanged = app
		.get(&format!("/transactions/{}", trx["id"].as_str().unwrap()))
		.await;
	assert_eq!(unchanged.body["status"], "pending");
}

#[tokio::test]
async fn test_unsigned_notification_accepted_when_not_required() {
	let app = common::setup_with(|config| {
		config.payments.require_webhook_signature = false;
	})
	.await;
	let trx = app.checkout(1, None).await.body;

	let res = app
		.webhook("midtrans", &settlement(&trx["invoice_number"]), None)
		.await;
	assert_eq!(res.status, StatusCode::OK, "{}", res.body);
	assert_eq!(res.body["status"], "settlement");
}

#[tokio::test]
async fn test_unknown_gateway_and_malformed_body() {
	let app = setup().await;

	let res = app.webhook("paypal", &json!({}), None).await;
	assert_eq!(res.status, StatusCode::NOT_FOUND);

	let res = app
		.send(
			Request::builder()
				.method("POST")
				.uri("/webhooks/midtrans")
				.body(Body::from("not json"))
				.unwrap(),
		)
		.await;
	assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unprocessable_notification_can_be_retried() {
	let app = common::setup_with(|config| {
		config.payments.require_webhook_signature = false;
	})
	.await;

	let res = app
		.webhook("midtrans", &settlement(&json!("INV/MISSING")), None)
		.await;
	assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
	assert_eq!(error_type(&res), "business_rule_violation");

	let stored = app.get("/webhooks/logs?criteria=is_processed:false").await;
	assert_eq!(stored.body["metas"]["total"], 1);
	assert_eq!(stored.body["data"][0]["attempts"], 1);
	assert!(stored.body["data"][0]["notes"]
		.as_str()
		.unwrap()
		.contains("INV/MISSING"));
	let callback_id = stored.body["data"][0]["id"].as_str().unwrap().to_string();

	let res = app
		.post(&format!("/webhooks/callbacks/{callback_id}/retry"), json!({}))
		.await;
	assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);

	let res = app
		.post("/webhooks/callbacks/missing/retry", json!({}))
		.await;
	assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_signature_test_endpoint() {
	let app = setup().await;
	let payload = json!({"order_id": "INV/1", "transaction_status": "settlement"});
	let expected = paygate_common_webhook::compute_signature(
		b"integrator-secret",
		&serde_json::to_vec(&payload).unwrap(),
	);

	let res = app
		.post(
			"/webhooks/test",
			json!({"secret": "integrator-secret", "payload": payload, "signature": expected}),
		)
		.await;
	assert_eq!(res.status, StatusCode::OK);
	assert_eq!(res.body["expected_signature"], expected.as_str());
	assert_eq!(res.body["valid"], true);

	let res = app
		.post(
			"/webhooks/test",
			json!({"secret": "integrator-secret", "payload": payload}),
		)
		.await;
	assert_eq!(res.body["valid"], Value::Null);
}
