// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod cors;
mod database;
mod http;
mod jobs;
mod logging;
mod payments;

pub use cors::{CorsConfig, CorsConfigLayer};
pub use database::{
	DatabaseConfig, DatabaseConfigLayer, DatabaseConnectionConfig, DatabaseConnectionLayer,
	DatabaseKind, DEFAULT_DATABASE_NAME, DEFAULT_SQLITE_PATH,
};
pub use http::{HttpConfig, HttpConfigLayer, DEFAULT_HOST, DEFAULT_PORT};
pub use jobs::{JobsConfig, JobsConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use payments::{PaymentsConfig, PaymentsConfigLayer};
