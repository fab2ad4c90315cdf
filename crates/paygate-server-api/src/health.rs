// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
	Healthy,
	Degraded,
	Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct DatabaseHealthResponse {
	pub name: String,
	pub healthy: bool,
	pub latency_ms: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct MigrationStatusResponse {
	pub current: Option<i64>,
	pub pending: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct HealthResponse {
	pub status: HealthStatus,
	pub timestamp: DateTime<Utc>,
	pub duration_ms: u64,
	pub version: String,
	pub databases: Vec<DatabaseHealthResponse>,
	/// Primary database only. `None` when the primary could not be queried.
	pub migrations: Option<MigrationStatusResponse>,
}
