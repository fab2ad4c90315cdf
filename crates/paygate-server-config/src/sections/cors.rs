// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cross-origin resource sharing policy.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorsConfig {
	pub allowed_origins: Vec<String>,
	pub allowed_methods: Vec<String>,
	pub allowed_headers: Vec<String>,
	pub allow_credentials: bool,
}

impl CorsConfig {
	pub fn allows_any_origin(&self) -> bool {
		self.allowed_origins.iter().any(|o| o == "*")
	}

	/// Browsers reject credentialed requests against a wildcard origin.
	pub fn effective_allow_credentials(&self) -> bool {
		self.allow_credentials && !self.allows_any_origin()
	}
}

fn wildcard() -> Vec<String> {
	vec!["*".to_string()]
}

impl Default for CorsConfig {
	fn default() -> Self {
		Self {
			allowed_origins: wildcard(),
			allowed_methods: wildcard(),
			allowed_headers: wildcard(),
			allow_credentials: true,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorsConfigLayer {
	pub allowed_origins: Option<Vec<String>>,
	pub allowed_methods: Option<Vec<String>>,
	pub allowed_headers: Option<Vec<String>>,
	pub allow_credentials: Option<bool>,
}

impl CorsConfigLayer {
	pub fn merge(&mut self, other: CorsConfigLayer) {
		if other.allowed_origins.is_some() {
			self.allowed_origins = other.allowed_origins;
		}
		if other.allowed_methods.is_some() {
			self.allowed_methods = other.allowed_methods;
		}
		if other.allowed_headers.is_some() {
			self.allowed_headers = other.allowed_headers;
		}
		if other.allow_credentials.is_some() {
			self.allow_credentials = other.allow_credentials;
		}
	}

	pub fn finalize(self) -> CorsConfig {
		CorsConfig {
			allowed_origins: self.allowed_origins.unwrap_or_else(wildcard),
			allowed_methods: self.allowed_methods.unwrap_or_else(wildcard),
			allowed_headers: self.allowed_headers.unwrap_or_else(wildcard),
			allow_credentials: self.allow_credentials.unwrap_or(true),
		}
	}
}
