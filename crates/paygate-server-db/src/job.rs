// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{DbError, Result};
use crate::time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
	Running,
	Succeeded,
	Failed,
	Cancelled,
}

impl JobStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			JobStatus::Running => "running",
			JobStatus::Succeeded => "succeeded",
			JobStatus::Failed => "failed",
			JobStatus::Cancelled => "cancelled",
		}
	}
}

impl std::str::FromStr for JobStatus {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"running" => Ok(JobStatus::Running),
			"succeeded" => Ok(JobStatus::Succeeded),
			"failed" => Ok(JobStatus::Failed),
			"cancelled" => Ok(JobStatus::Cancelled),
			_ => Err(format!("unknown job status: {s}")),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
	Schedule,
	Manual,
	Retry,
}

impl TriggerSource {
	pub fn as_str(&self) -> &'static str {
		match self {
			TriggerSource::Schedule => "schedule",
			TriggerSource::Manual => "manual",
			TriggerSource::Retry => "retry",
		}
	}
}

impl std::str::FromStr for TriggerSource {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"schedule" => Ok(TriggerSource::Schedule),
			"manual" => Ok(TriggerSource::Manual),
			"retry" => Ok(TriggerSource::Retry),
			_ => Err(format!("unknown trigger source: {s}")),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
	pub id: String,
	pub name: String,
	pub description: String,
	pub job_type: String,
	pub interval_secs: Option<i64>,
	pub enabled: bool,
}

/// One attempt of a job. Retries are separate runs with `triggered_by = retry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRun {
	pub id: String,
	pub job_id: String,
	pub status: JobStatus,
	pub started_at: DateTime<Utc>,
	pub completed_at: Option<DateTime<Utc>>,
	pub duration_ms: Option<i64>,
	pub error_message: Option<String>,
	pub retry_count: u32,
	pub triggered_by: TriggerSource,
	pub metadata: Option<serde_json::Value>,
}

const RUN_COLUMNS: &str = "id, job_id, status, started_at, completed_at, duration_ms, error_message, retry_count, triggered_by, metadata";

#[derive(Clone)]
pub struct JobRepository {
	pool: SqlitePool,
}

impl JobRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, def), fields(job_id = %def.id))]
	pub async fn upsert_definition(&self, def: &JobDefinition) -> Result<()> {
		let now = time::encode(time::now());
		sqlx::query(
			r#"
            INSERT INTO job_definitions (id, name, description, job_type, interval_secs, enabled, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                job_type = excluded.job_type,
                interval_secs = excluded.interval_secs,
                enabled = excluded.enabled,
                updated_at = excluded.updated_at
            "#,
		)
		.bind(&def.id)
		.bind(&def.name)
		.bind(&def.description)
		.bind(&def.job_type)
		.bind(def.interval_secs)
		.bind(def.enabled)
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_definitions(&self) -> Result<Vec<JobDefinition>> {
		let rows = sqlx::query_as::<_, (String, String, Option<String>, String, Option<i64>, bool)>(
			"SELECT id, name, description, job_type, interval_secs, enabled FROM job_definitions ORDER BY name",
		)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows
			.into_iter()
			.map(
				|(id, name, description, job_type, interval_secs, enabled)| JobDefinition {
					id,
					name,
					description: description.unwrap_or_default(),
					job_type,
					interval_secs,
					enabled,
				},
			)
			.collect())
	}

	#[tracing::instrument(skip(self, run), fields(run_id = %run.id, job_id = %run.job_id))]
	pub async fn record_run_start(&self, run: &JobRun) -> Result<()> {
		sqlx::query(
			r#"
            INSERT INTO job_runs (id, job_id, status, started_at, retry_count, triggered_by)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
		)
		.bind(&run.id)
		.bind(&run.job_id)
		.bind(run.status.as_str())
		.bind(time::encode(run.started_at))
		.bind(run.retry_count as i64)
		.bind(run.triggered_by.as_str())
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[tracing::instrument(skip(self, metadata))]
	pub async fn record_run_complete(
		&self,
		run_id: &str,
		status: JobStatus,
		error: Option<String>,
		metadata: Option<serde_json::Value>,
	) -> Result<()> {
		let now = time::encode(time::now());
		let metadata_str = metadata.map(|m| m.to_string());

		let result = sqlx::query(
			r#"
            UPDATE job_runs
            SET status = ?,
                completed_at = ?,
                duration_ms = CAST((julianday(?) - julianday(started_at)) * 86400000 AS INTEGER),
                error_message = ?,
                metadata = ?
            WHERE id = ?
            "#,
		)
		.bind(status.as_str())
		.bind(&now)
		.bind(&now)
		.bind(error)
		.bind(metadata_str)
		.bind(run_id)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("job run {run_id}")));
		}

		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_last_run(&self, job_id: &str) -> Result<Option<JobRun>> {
		let row = sqlx::query_as::<_, JobRunRow>(&format!(
			"SELECT {RUN_COLUMNS} FROM job_runs WHERE job_id = ? ORDER BY started_at DESC LIMIT 1"
		))
		.bind(job_id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	/// Newest first.
	#[tracing::instrument(skip(self))]
	pub async fn list_runs(&self, job_id: &str, limit: u32, offset: u32) -> Result<Vec<JobRun>> {
		let rows = sqlx::query_as::<_, JobRunRow>(&format!(
			"SELECT {RUN_COLUMNS} FROM job_runs WHERE job_id = ? ORDER BY started_at DESC LIMIT ? OFFSET ?"
		))
		.bind(job_id)
		.bind(limit as i64)
		.bind(offset as i64)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[tracing::instrument(skip(self))]
	pub async fn delete_old_runs(&self, before: DateTime<Utc>) -> Result<u64> {
		let result = sqlx::query("DELETE FROM job_runs WHERE completed_at IS NOT NULL AND completed_at < ?")
			.bind(time::encode(before))
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected())
	}

	/// Delete finished runs older than `retention_days`. Running jobs are kept.
	#[tracing::instrument(skip(self))]
	pub async fn cleanup_old_runs(&self, retention_days: u32) -> Result<u64> {
		let cutoff = time::now() - chrono::Duration::days(retention_days as i64);
		self.delete_old_runs(cutoff).await
	}
}

#[derive(sqlx::FromRow)]
struct JobRunRow {
	id: String,
	job_id: String,
	status: String,
	started_at: String,
	completed_at: Option<String>,
	duration_ms: Option<i64>,
	error_message: Option<String>,
	retry_count: i64,
	triggered_by: String,
	metadata: Option<String>,
}

impl TryFrom<JobRunRow> for JobRun {
	type Error = DbError;

	fn try_from(row: JobRunRow) -> Result<Self> {
		Ok(JobRun {
			id: row.id,
			job_id: row.job_id,
			status: row.status.parse().map_err(DbError::Internal)?,
			started_at: time::decode("started_at", &row.started_at)?,
			completed_at: time::decode_opt("completed_at", row.completed_at)?,
			duration_ms: row.duration_ms,
			error_message: row.error_message,
			retry_count: row.retry_count as u32,
			triggered_by: row.triggered_by.parse().map_err(DbError::Internal)?,
			metadata: row
				.metadata
				.as_deref()
				.and_then(|s| serde_json::from_str(s).ok()),
		})
	}
}
