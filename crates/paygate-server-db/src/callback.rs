// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use paygate_core::GatewayCallback;
use sqlx::SqlitePool;

use crate::error::{DbError, Result};
use crate::filter::{paginate, ColumnKind, FilterSchema, ListQuery, Page};
use crate::{json, time};

pub const CALLBACK_FILTER: FilterSchema = FilterSchema {
	table: "payment_gateway_callbacks",
	columns: &[
		("id", ColumnKind::Text),
		("transaction_id", ColumnKind::Text),
		("gateway_id", ColumnKind::Text),
		("callback_type", ColumnKind::Text),
		("is_signature_valid", ColumnKind::Bool),
		("is_processed", ColumnKind::Bool),
		("processed_at", ColumnKind::Timestamp),
		("attempts", ColumnKind::Integer),
		("ip_address", ColumnKind::Text),
		("user_agent", ColumnKind::Text),
		("notes", ColumnKind::Text),
		("created_at", ColumnKind::Timestamp),
	],
	default_order: "created_at DESC",
};

const CALLBACK_COLUMNS: &str = "id, transaction_id, gateway_id, callback_type, raw_payload, signature, is_signature_valid, is_processed, processed_at, attempts, ip_address, user_agent, notes, created_at";

#[derive(Clone)]
pub struct CallbackRepository {
	pool: SqlitePool,
}

impl CallbackRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, callback), fields(callback_id = %callback.id, gateway_id = %callback.gateway_id))]
	pub async fn record(&self, callback: &GatewayCallback) -> Result<()> {
		sqlx::query(&format!(
			"INSERT INTO payment_gateway_callbacks ({CALLBACK_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
		))
		.bind(&callback.id)
		.bind(&callback.transaction_id)
		.bind(&callback.gateway_id)
		.bind(callback.callback_type.as_str())
		.bind(callback.raw_payload.to_string())
		.bind(&callback.signature)
		.bind(callback.is_signature_valid)
		.bind(callback.is_processed)
		.bind(time::encode_opt(callback.processed_at))
		.bind(callback.attempts)
		.bind(&callback.ip_address)
		.bind(&callback.user_agent)
		.bind(&callback.notes)
		.bind(time::encode(callback.created_at))
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get(&self, id: &str) -> Result<Option<GatewayCallback>> {
		let row = sqlx::query_as::<_, CallbackRow>(&format!(
			"SELECT {CALLBACK_COLUMNS} FROM payment_gateway_callbacks WHERE id = ?"
		))
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	/// Newest first unless the query sorts otherwise.
	#[tracing::instrument(skip(self, query), fields(limit = query.limit, offset = query.offset))]
	pub async fn list(&self, query: &ListQuery) -> Result<Page<GatewayCallback>> {
		paginate::<CallbackRow, GatewayCallback>(&self.pool, &CALLBACK_FILTER, CALLBACK_COLUMNS, query)
			.await
	}

	/// Mark a callback as handled. Counts as one attempt. `transaction_id`
	/// fills in the link when it was unknown at intake.
	#[tracing::instrument(skip(self, notes))]
	pub async fn mark_processed(
		&self,
		id: &str,
		transaction_id: Option<&str>,
		notes: Option<&str>,
	) -> Result<()> {
		let result = sqlx::query(
			r#"
            UPDATE payment_gateway_callbacks
            SET is_processed = 1,
                processed_at = ?,
                attempts = attempts + 1,
                transaction_id = COALESCE(?, transaction_id),
                notes = COALESCE(?, notes)
            WHERE id = ?
            "#,
		)
		.bind(time::encode(time::now()))
		.bind(transaction_id)
		.bind(notes)
		.bind(id)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("callback {id}")));
		}
		Ok(())
	}

	/// Record a failed processing attempt.
	#[tracing::instrument(skip(self, notes))]
	pub async fn record_failure(&self, id: &str, notes: &str) -> Result<()> {
		let result = sqlx::query(
			"UPDATE payment_gateway_callbacks SET attempts = attempts + 1, notes = ? WHERE id = ?",
		)
		.bind(notes)
		.bind(id)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("callback {id}")));
		}
		Ok(())
	}

	/// Unprocessed callbacks with fewer than `max_attempts` attempts, oldest
	/// first. With `require_signature` only correctly signed ones qualify.
	#[tracing::instrument(skip(self))]
	pub async fn list_retryable(
		&self,
		max_attempts: i64,
		limit: i64,
		require_signature: bool,
	) -> Result<Vec<GatewayCallback>> {
		let rows = sqlx::query_as::<_, CallbackRow>(&format!(
			r#"
            SELECT {CALLBACK_COLUMNS} FROM payment_gateway_callbacks
            WHERE is_processed = 0
              AND (is_signature_valid = 1 OR ? = 0)
              AND attempts < ?
            ORDER BY created_at ASC, rowid ASC
            LIMIT ?
            "#
		))
		.bind(require_signature)
		.bind(max_attempts)
		.bind(limit)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}
}

#[derive(sqlx::FromRow)]
struct CallbackRow {
	id: String,
	transaction_id: Option<String>,
	gateway_id: String,
	callback_type: String,
	raw_payload: String,
	signature: Option<String>,
	is_signature_valid: bool,
	is_processed: bool,
	processed_at: Option<String>,
	attempts: i64,
	ip_address: Option<String>,
	user_agent: Option<String>,
	notes: Option<String>,
	created_at: String,
}

impl TryFrom<CallbackRow> for GatewayCallback {
	type Error = DbError;

	fn try_from(row: CallbackRow) -> Result<Self> {
		Ok(GatewayCallback {
			id: row.id,
			transaction_id: row.transaction_id,
			gateway_id: row.gateway_id,
			callback_type: row.callback_type.parse()?,
			raw_payload: json::decode(&row.raw_payload)?,
			signature: row.signature,
			is_signature_valid: row.is_signature_valid,
			is_processed: row.is_processed,
			processed_at: time::decode_opt("processed_at", row.processed_at)?,
			attempts: row.attempts,
			ip_address: row.ip_address,
			user_agent: row.user_agent,
			notes: row.notes,
			created_at: time::decode("created_at", &row.created_at)?,
		})
	}
}
