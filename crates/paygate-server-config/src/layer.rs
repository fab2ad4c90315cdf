// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The partial, mergeable form of [`crate::ServerConfig`].

use serde::{Deserialize, Serialize};

use crate::sections::{
	CorsConfigLayer, DatabaseConfigLayer, HttpConfigLayer, JobsConfigLayer, LoggingConfigLayer,
	PaymentsConfigLayer,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub http: Option<HttpConfigLayer>,
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub cors: Option<CorsConfigLayer>,
	#[serde(default)]
	pub jobs: Option<JobsConfigLayer>,
	#[serde(default)]
	pub payments: Option<PaymentsConfigLayer>,
}

macro_rules! merge_section {
	($self:ident, $other:ident, $($section:ident),+) => {
		$(
			match ($self.$section.as_mut(), $other.$section) {
				(Some(current), Some(incoming)) => current.merge(incoming),
				(None, Some(incoming)) => $self.$section = Some(incoming),
				(_, None) => {}
			}
		)+
	};
}

impl ServerConfigLayer {
	/// Overlay `other` on top of `self`; fields set in `other` win.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section!(self, other, http, database, logging, cors, jobs, payments);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_fills_missing_sections() {
		let mut base = ServerConfigLayer::default();
		base.merge(ServerConfigLayer {
			http: Some(HttpConfigLayer {
				port: Some(9000),
				..Default::default()
			}),
			..Default::default()
		});
		assert_eq!(base.http.unwrap().port, Some(9000));
	}

	#[test]
	fn test_merge_is_field_level() {
		let mut base = ServerConfigLayer {
			http: Some(HttpConfigLayer {
				host: Some("127.0.0.1".to_string()),
				port: Some(8000),
				base_url: None,
			}),
			..Default::default()
		};
		base.merge(ServerConfigLayer {
			http: Some(HttpConfigLayer {
				port: Some(9000),
				..Default::default()
			}),
			..Default::default()
		});
		let http = base.http.unwrap();
		assert_eq!(http.host.as_deref(), Some("127.0.0.1"));
		assert_eq!(http.port, Some(9000));
	}

	#[test]
	fn test_parse_full_toml() {
		let layer: ServerConfigLayer = toml::from_str(
			r#"
[http]
port = 8080

[database.primary]
type = "sqlite"
path = ":memory:"

[cors]
allowed_origins = ["https://shop.example.com"]

[payments]
require_webhook_signature = false
"#,
		)
		.unwrap();
		assert_eq!(layer.http.unwrap().port, Some(8080));
		assert_eq!(
			layer.payments.unwrap().require_webhook_signature,
			Some(false)
		);
		assert!(layer.logging.is_none());
	}
}
