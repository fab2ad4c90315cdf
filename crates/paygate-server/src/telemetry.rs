// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracing subscriber setup.

use paygate_server_config::LoggingConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directives: `RUST_LOG` when set, otherwise the configured level.
/// sqlx statement logging stays at `warn` unless `echo` is on.
pub fn filter_directives(base: &str, echo: bool) -> String {
	let sqlx = if echo { "sqlx=debug" } else { "sqlx=warn" };
	if base.split(',').any(|d| d.trim().starts_with("sqlx")) {
		base.to_string()
	} else {
		format!("{base},{sqlx}")
	}
}

pub fn init_tracing(logging: &LoggingConfig, echo: bool) {
	let base = std::env::var("RUST_LOG")
		.ok()
		.filter(|v| !v.trim().is_empty())
		.unwrap_or_else(|| logging.level.clone());
	let filter = EnvFilter::try_new(filter_directives(&base, echo))
		.unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

	let registry = tracing_subscriber::registry().with(filter);
	if logging.json {
		registry
			.with(tracing_subscriber::fmt::layer().json())
			.init();
	} else {
		registry.with(tracing_subscriber::fmt::layer()).init();
	}
}
