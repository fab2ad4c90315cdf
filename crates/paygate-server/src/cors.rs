// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! CORS layer built from [`CorsConfig`].

use axum::http::{HeaderName, HeaderValue, Method};
use paygate_server_config::CorsConfig;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};

fn is_wildcard(values: &[String]) -> bool {
	values.iter().any(|v| v == "*")
}

/// Credentials are only allowed with an explicit origin list; tower-http
/// refuses wildcards alongside credentials, so methods and headers are
/// mirrored from the request in that case.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
	if config.allow_credentials && config.allows_any_origin() {
		tracing::warn!("CORS allows any origin; credentials disabled");
	}
	let credentials = config.effective_allow_credentials();

	let origins = if config.allows_any_origin() {
		AllowOrigin::from(Any)
	} else {
		let parsed: Vec<HeaderValue> = config
			.allowed_origins
			.iter()
			.filter_map(|origin| match HeaderValue::from_str(origin) {
				Ok(value) => Some(value),
				Err(_) => {
					tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
					None
				}
			})
			.collect();
		AllowOrigin::list(parsed)
	};

	let methods = if is_wildcard(&config.allowed_methods) {
		if credentials {
			AllowMethods::mirror_request()
		} else {
			AllowMethods::from(Any)
		}
	} else {
		let parsed: Vec<Method> = config
			.allowed_methods
			.iter()
			.filter_map(|m| Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes()).ok())
			.collect();
		AllowMethods::list(parsed)
	};

	let headers = if is_wildcard(&config.allowed_headers) {
		if credentials {
			AllowHeaders::mirror_request()
		} else {
			AllowHeaders::from(Any)
		}
	} else {
		let parsed: Vec<HeaderName> = config
			.allowed_headers
			.iter()
			.filter_map(|h| HeaderName::from_bytes(h.trim().as_bytes()).ok())
			.collect();
		AllowHeaders::list(parsed)
	};

	CorsLayer::new()
		.allow_origin(origins)
		.allow_methods(methods)
		.allow_headers(headers)
		.allow_credentials(credentials)
}
