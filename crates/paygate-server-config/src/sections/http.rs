// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP listener configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
	pub host: String,
	pub port: u16,
	pub base_url: String,
}

impl HttpConfig {
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}
}

impl Default for HttpConfig {
	fn default() -> Self {
		Self {
			host: DEFAULT_HOST.to_string(),
			port: DEFAULT_PORT,
			base_url: format!("http://localhost:{DEFAULT_PORT}"),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpConfigLayer {
	pub host: Option<String>,
	pub port: Option<u16>,
	pub base_url: Option<String>,
}

impl HttpConfigLayer {
	pub fn merge(&mut self, other: HttpConfigLayer) {
		if other.host.is_some() {
			self.host = other.host;
		}
		if other.port.is_some() {
			self.port = other.port;
		}
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
	}

	pub fn finalize(self) -> Result<HttpConfig, ConfigError> {
		let port = self.port.unwrap_or(DEFAULT_PORT);
		if port == 0 {
			return Err(ConfigError::Validation(
				"http.port must be between 1 and 65535".to_string(),
			));
		}
		Ok(HttpConfig {
			host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
			port,
			base_url: self
				.base_url
				.unwrap_or_else(|| format!("http://localhost:{port}")),
		})
	}
}
