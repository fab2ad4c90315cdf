// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request ids.
//!
//! Every response carries `x-request-id`: the incoming value when the client
//! sent a usable one, otherwise a fresh UUID. The id, method and path are kept
//! in a task-local for the duration of the request so that error responses
//! and logs can include them.

use axum::{
	extract::Request,
	http::{HeaderName, HeaderValue},
	middleware::Next,
	response::Response,
};
use uuid::Uuid;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct RequestContext {
	pub request_id: String,
	pub method: String,
	pub path: String,
}

tokio::task_local! {
	static CURRENT: RequestContext;
}

/// Context of the request being handled, if any.
pub fn current() -> Option<RequestContext> {
	CURRENT.try_with(Clone::clone).ok()
}

pub fn current_request_id() -> String {
	current()
		.map(|ctx| ctx.request_id)
		.unwrap_or_else(|| "unknown".to_string())
}

fn incoming_id(request: &Request) -> Option<String> {
	let value = request.headers().get(&REQUEST_ID_HEADER)?.to_str().ok()?.trim();
	if value.is_empty()
		|| value.len() > MAX_REQUEST_ID_LEN
		|| !value.chars().all(|c| c.is_ascii_graphic())
	{
		return None;
	}
	Some(value.to_string())
}

pub async fn request_id_layer(mut request: Request, next: Next) -> Response {
	let request_id = incoming_id(&request).unwrap_or_else(|| Uuid::new_v4().to_string());
	let ctx = RequestContext {
		request_id: request_id.clone(),
		method: request.method().to_string(),
		path: request.uri().path().to_string(),
	};
	request.extensions_mut().insert(ctx.clone());

	let mut response = CURRENT.scope(ctx, next.run(request)).await;
	if let Ok(value) = HeaderValue::from_str(&request_id) {
		response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
	}
	response
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::{body::Body, middleware::from_fn, routing::get, Router};
	use tower::ServiceExt;

	fn app() -> Router {
		Router::new()
			.route("/", get(|| async { current_request_id() }))
			.layer(from_fn(request_id_layer))
	}

	#[tokio::test]
	async fn test_generates_request_id() {
		let response = app()
			.oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
			.await
			.unwrap();
		let header = response.headers().get("x-request-id").unwrap().to_str().unwrap().to_string();
		assert!(Uuid::parse_str(&header).is_ok());

		let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
		assert_eq!(body, header.as_bytes());
	}

	#[tokio::test]
	async fn test_echoes_incoming_request_id() {
		let response = app()
			.oneshot(
				Request::builder()
					.uri("/")
					.header("x-request-id", "trace-abc-123")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.headers()["x-request-id"], "trace-abc-123");
	}

	#[tokio::test]
	async fn test_replaces_unusable_request_id() {
		let response = app()
			.oneshot(
				Request::builder()
					.uri("/")
					.header("x-request-id", "has spaces")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_ne!(response.headers()["x-request-id"], "has spaces");
	}

	#[test]
	fn test_outside_request_is_unknown() {
		assert_eq!(current_request_id(), "unknown");
	}
}
