// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::str::FromStr;
use std::time::Duration;

use paygate_server_config::{DatabaseConnectionConfig, DatabaseKind};
use sqlx::sqlite::{
	SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{ConnectOptions, Sqlite, Transaction};

use crate::error::DbError;

/// Create a SqlitePool for one configured database.
///
/// File databases run in WAL mode with foreign keys enforced. In-memory
/// databases are limited to a single long-lived connection so that every
/// caller sees the same data.
///
/// # Errors
/// Returns `DbError::UnsupportedDriver` for non-SQLite kinds and
/// `DbError::Internal` if the URL is invalid.
#[tracing::instrument(skip(config), fields(database = %config.redacted_url()))]
pub async fn create_pool(config: &DatabaseConnectionConfig) -> Result<SqlitePool, DbError> {
	if config.kind != DatabaseKind::Sqlite {
		return Err(DbError::UnsupportedDriver(config.kind.to_string()));
	}

	let mut options = SqliteConnectOptions::from_str(&config.url())
		.map_err(|e| DbError::Internal(format!("Invalid database URL: {e}")))?
		.foreign_keys(true)
		.busy_timeout(Duration::from_secs(config.connect_timeout_secs));

	if !config.is_in_memory() {
		options = options
			.journal_mode(SqliteJournalMode::Wal)
			.synchronous(SqliteSynchronous::Normal)
			.create_if_missing(true);
	}

	if !config.echo {
		options = options.disable_statement_logging();
	}

	let pool_options = if config.is_in_memory() {
		SqlitePoolOptions::new()
			.max_connections(1)
			.min_connections(1)
			.idle_timeout(None)
			.max_lifetime(None)
	} else {
		let max_lifetime = u64::try_from(config.pool_recycle_secs)
			.ok()
			.map(Duration::from_secs);
		SqlitePoolOptions::new()
			.max_connections(config.max_connections().max(1))
			.max_lifetime(max_lifetime)
	};

	let pool = pool_options
		.acquire_timeout(Duration::from_secs(config.pool_timeout_secs))
		.connect_with(options)
		.await?;

	tracing::debug!(
		max_connections = config.max_connections(),
		in_memory = config.is_in_memory(),
		"database pool created"
	);
	Ok(pool)
}

/// Open a write transaction holding the database write lock from the start.
///
/// A deferred `BEGIN` that reads and then writes fails with `SQLITE_BUSY`
/// without consulting the busy timeout when another connection is writing.
/// `BEGIN IMMEDIATE` waits on the busy timeout instead.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, DbError> {
	Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}
