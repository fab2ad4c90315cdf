// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Health, request id and API document integration tests.

mod common;

use axum::{
	body::Body,
	http::{Request, StatusCode},
};
use common::setup;

#[tokio::test]
async fn test_health_reports_primary_and_migrations() {
	let app = setup().await;
	let res = app.get("/health").await;

	assert_eq!(res.status, StatusCode::OK);
	assert_eq!(res.body["status"], "healthy");
	assert_eq!(res.body["version"], env!("CARGO_PKG_VERSION"));
	assert_eq!(res.body["databases"][0]["name"], "primary");
	assert_eq!(res.body["databases"][0]["healthy"], true);
	assert!(res.body["migrations"]["current"].is_i64());
	assert_eq!(res.body["migrations"]["pending"], serde_json::json!([]));
}

#[tokio::test]
async fn test_health_lists_replica() {
	let app = common::setup_with(|config| {
		config.database.replica = Some(config.database.primary.clone());
	})
	.await;
	let res = app.get("/health").await;

	assert_eq!(res.status, StatusCode::OK);
	let names: Vec<&str> = res.body["databases"]
		.as_array()
		.unwrap()
		.iter()
		.map(|db| db["name"].as_str().unwrap())
		.collect();
	assert!(names.contains(&"primary"));
	assert!(names.contains(&"replica"));

	// Reads go through the replica, which shares the file here.
	let res = app.get(&format!("/products/{}", app.fixture.product.id)).await;
	assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_request_id_is_echoed_into_header_and_error_body() {
	let app = setup().await;
	let res = app
		.send(
			Request::builder()
				.uri("/products/does-not-exist")
				.header("x-request-id", "trace-42")
				.body(Body::empty())
				.unwrap(),
		)
		.await;

	assert_eq!(res.status, StatusCode::NOT_FOUND);
	assert_eq!(res.headers["x-request-id"], "trace-42");
	assert_eq!(res.body["error"]["request_id"], "trace-42");
	assert_eq!(common::error_type(&res), "not_found");
}

#[tokio::test]
async fn test_request_id_is_generated_when_absent() {
	let app = setup().await;
	let res = app.get("/health").await;

	let id = res.headers["x-request-id"].to_str().unwrap();
	assert!(uuid::Uuid::parse_str(id).is_ok(), "not a uuid: {id}");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
	let app = setup().await;
	let res = app.get("/api-docs/openapi.json").await;

	assert_eq!(res.status, StatusCode::OK);
	assert_eq!(res.body["info"]["title"], "Paygate API");
	assert!(res.body["paths"]["/transactions"]["post"].is_object());
	assert!(res.body["paths"]["/webhooks/{gateway_code}"]["post"].is_object());
}
