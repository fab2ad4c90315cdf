// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Health HTTP handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use paygate_server_api::{
	DatabaseHealthResponse, HealthResponse, HealthStatus, MigrationStatusResponse,
};
use paygate_server_db::DatabaseManager;

use crate::api::AppState;

/// Unhealthy when the primary is down, degraded when only a secondary is.
pub fn aggregate_status(primary: Option<&str>, databases: &[DatabaseHealthResponse]) -> HealthStatus {
	let primary_healthy = databases
		.iter()
		.find(|db| Some(db.name.as_str()) == primary)
		.is_some_and(|db| db.healthy);
	if !primary_healthy {
		HealthStatus::Unhealthy
	} else if databases.iter().all(|db| db.healthy) {
		HealthStatus::Healthy
	} else {
		HealthStatus::Degraded
	}
}

async fn migration_status(databases: &DatabaseManager) -> Option<MigrationStatusResponse> {
	let runner = databases.migration_runner(None).ok()?;
	let current = match runner.current().await {
		Ok(current) => current,
		Err(e) => {
			tracing::warn!(error = %e, "failed to read current migration");
			return None;
		}
	};
	let pending = match runner.pending().await {
		Ok(pending) => pending.into_iter().map(|m| m.version).collect(),
		Err(e) => {
			tracing::warn!(error = %e, "failed to read pending migrations");
			return None;
		}
	};
	Some(MigrationStatusResponse { current, pending })
}

#[utoipa::path(
	get,
	path = "/health",
	responses(
		(status = 200, description = "Primary database is reachable", body = HealthResponse),
		(status = 503, description = "Primary database is unreachable", body = HealthResponse)
	),
	tag = "health"
)]
/// GET /health - Database connectivity and schema status.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let start = tokio::time::Instant::now();

	let databases: Vec<DatabaseHealthResponse> = state
		.databases
		.health_check()
		.await
		.into_iter()
		.map(|db| DatabaseHealthResponse {
			name: db.name,
			healthy: db.healthy,
			latency_ms: db.latency_ms,
			error: db.error,
		})
		.collect();
	let status = aggregate_status(state.databases.primary_name(), &databases);
	let migrations = migration_status(&state.databases).await;

	let response = HealthResponse {
		status,
		timestamp: chrono::Utc::now(),
		duration_ms: start.elapsed().as_millis() as u64,
		version: crate::version::VERSION.to_string(),
		databases,
		migrations,
	};

	let http_status = match status {
		HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
		HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
	};
	(http_status, Json(response))
}
