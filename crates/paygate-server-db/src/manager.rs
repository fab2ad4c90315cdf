// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Registry of named database pools.
//!
//! A deployment has one writable `primary` database and may add a read
//! `replica` and an `analytics` database. Handlers ask for [`reader`] or
//! [`primary`] and the manager falls back to the primary when a secondary is
//! not configured.
//!
//! [`reader`]: DatabaseManager::reader
//! [`primary`]: DatabaseManager::primary

use std::time::{Duration, Instant};

use paygate_server_config::{DatabaseConfig, DatabaseConnectionConfig};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, instrument, warn};

use crate::error::{DbError, Result};
use crate::migrations::MigrationRunner;
use crate::pool::create_pool;

pub const PRIMARY_DATABASE: &str = "primary";
pub const REPLICA_DATABASE: &str = "replica";
pub const ANALYTICS_DATABASE: &str = "analytics";

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DatabaseHealth {
	pub name: String,
	pub healthy: bool,
	pub latency_ms: Option<u64>,
	pub error: Option<String>,
}

struct RegisteredDatabase {
	name: String,
	config: DatabaseConnectionConfig,
	pool: Option<SqlitePool>,
}

impl RegisteredDatabase {
	/// Replicas are never written to, including by migrations.
	fn is_read_only(&self) -> bool {
		self.name == REPLICA_DATABASE
	}
}

#[derive(Default)]
pub struct DatabaseManager {
	databases: Vec<RegisteredDatabase>,
	primary: Option<String>,
}

impl DatabaseManager {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register the primary plus any configured replica and analytics databases.
	pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
		let mut manager = Self::new();
		manager.register(PRIMARY_DATABASE, config.primary.clone(), true)?;
		if let Some(replica) = &config.replica {
			manager.register(REPLICA_DATABASE, replica.clone(), false)?;
		}
		if let Some(analytics) = &config.analytics {
			manager.register(ANALYTICS_DATABASE, analytics.clone(), false)?;
		}
		Ok(manager)
	}

	/// Register a database. The first registration becomes primary unless a
	/// later one is explicitly marked primary.
	pub fn register(
		&mut self,
		name: &str,
		config: DatabaseConnectionConfig,
		is_primary: bool,
	) -> Result<()> {
		if self.databases.iter().any(|db| db.name == name) {
			return Err(DbError::Conflict(format!(
				"database '{name}' is already registered"
			)));
		}
		if is_primary || self.primary.is_none() {
			self.primary = Some(name.to_string());
		}
		info!(
			database = name,
			url = %config.redacted_url(),
			is_primary,
			"registered database"
		);
		self.databases.push(RegisteredDatabase {
			name: name.to_string(),
			config,
			pool: None,
		});
		Ok(())
	}

	/// Open pools for every registered database that does not have one yet.
	#[instrument(skip(self))]
	pub async fn initialize(&mut self) -> Result<()> {
		for db in self.databases.iter_mut().filter(|db| db.pool.is_none()) {
			let pool = create_pool(&db.config).await?;
			info!(database = %db.name, kind = %db.config.kind, "database initialized");
			db.pool = Some(pool);
		}
		Ok(())
	}

	/// Pool for `name`, or the primary when `name` is `None`.
	pub fn get(&self, name: Option<&str>) -> Result<SqlitePool> {
		let name = match name {
			Some(name) => name,
			None => self
				.primary
				.as_deref()
				.ok_or_else(|| DbError::NotFound("no primary database registered".to_string()))?,
		};
		let db = self
			.databases
			.iter()
			.find(|db| db.name == name)
			.ok_or_else(|| DbError::NotFound(format!("database '{name}'")))?;
		match &db.pool {
			Some(pool) if pool.is_closed() => Err(DbError::Internal(format!(
				"database '{name}' is closed"
			))),
			Some(pool) => Ok(pool.clone()),
			None => Err(DbError::Internal(format!(
				"database '{name}' is not initialized"
			))),
		}
	}

	pub fn primary(&self) -> Result<SqlitePool> {
		self.get(None)
	}

	/// Replica when registered and open, otherwise the primary.
	pub fn reader(&self) -> Result<SqlitePool> {
		self.get(Some(REPLICA_DATABASE)).or_else(|_| self.primary())
	}

	/// Analytics database when registered, otherwise the primary.
	pub fn analytics(&self) -> Result<SqlitePool> {
		if self.is_registered(ANALYTICS_DATABASE) {
			self.get(Some(ANALYTICS_DATABASE))
		} else {
			self.primary()
		}
	}

	pub fn is_registered(&self, name: &str) -> bool {
		self.databases.iter().any(|db| db.name == name)
	}

	pub fn primary_name(&self) -> Option<&str> {
		self.primary.as_deref()
	}

	/// Registered names in registration order.
	pub fn names(&self) -> Vec<String> {
		self.databases.iter().map(|db| db.name.clone()).collect()
	}

	pub fn migration_runner(&self, name: Option<&str>) -> Result<MigrationRunner> {
		Ok(MigrationRunner::new(self.get(name)?))
	}

	/// Run `SELECT 1` against every database.
	#[instrument(skip(self))]
	pub async fn health_check(&self) -> Vec<DatabaseHealth> {
		let mut results = Vec::with_capacity(self.databases.len());
		for db in &self.databases {
			let health = match self.get(Some(&db.name)) {
				Ok(pool) => ping(&db.name, &pool).await,
				Err(e) => DatabaseHealth {
					name: db.name.clone(),
					healthy: false,
					latency_ms: None,
					error: Some(e.to_string()),
				},
			};
			if !health.healthy {
				warn!(database = %db.name, error = ?health.error, "database health check failed");
			}
			results.push(health);
		}
		results
	}

	/// Upgrade every writable database to the latest revision.
	#[instrument(skip(self))]
	pub async fn upgrade_all(&self) -> Result<Vec<(String, Vec<i64>)>> {
		let mut upgraded = Vec::new();
		for db in self.databases.iter().filter(|db| !db.is_read_only()) {
			info!(database = %db.name, "upgrading database");
			let applied = self.migration_runner(Some(&db.name))?.upgrade().await?;
			info!(database = %db.name, applied = applied.len(), "database is at head");
			upgraded.push((db.name.clone(), applied));
		}
		Ok(upgraded)
	}

	/// Close every pool. Later lookups fail.
	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		for db in &self.databases {
			if let Some(pool) = &db.pool {
				pool.close().await;
				info!(database = %db.name, "database pool closed");
			}
		}
	}
}

async fn ping(name: &str, pool: &SqlitePool) -> DatabaseHealth {
	let start = Instant::now();
	let result = tokio::time::timeout(HEALTH_CHECK_TIMEOUT, sqlx::query("SELECT 1").execute(pool)).await;
	let latency_ms = Some(start.elapsed().as_millis() as u64);
	let error = match result {
		Ok(Ok(_)) => None,
		Ok(Err(e)) => Some(e.to_string()),
		Err(_) => Some(format!(
			"timed out after {}s",
			HEALTH_CHECK_TIMEOUT.as_secs()
		)),
	};
	DatabaseHealth {
		name: name.to_string(),
		healthy: error.is_none(),
		latency_ms,
		error,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use paygate_server_config::DatabaseKind;

	fn memory() -> DatabaseConnectionConfig {
		DatabaseConnectionConfig::in_memory()
	}

	#[test]
	fn test_first_registered_is_primary() {
		let mut manager = DatabaseManager::new();
		manager.register("main", memory(), false).unwrap();
		manager.register("reports", memory(), false).unwrap();
		assert_eq!(manager.primary_name(), Some("main"));

		manager.register("ledger", memory(), true).unwrap();
		assert_eq!(manager.primary_name(), Some("ledger"));
		assert_eq!(manager.names(), vec!["main", "reports", "ledger"]);
	}

	#[test]
	fn test_duplicate_registration_conflicts() {
		let mut manager = DatabaseManager::new();
		manager.register("main", memory(), true).unwrap();
		assert!(matches!(
			manager.register("main", memory(), false),
			Err(DbError::Conflict(_))
		));
	}

	#[test]
	fn test_get_errors() {
		let mut manager = DatabaseManager::new();
		assert!(matches!(manager.primary(), Err(DbError::NotFound(_))));

		manager.register("main", memory(), true).unwrap();
		assert!(matches!(manager.get(Some("other")), Err(DbError::NotFound(_))));
		match manager.primary() {
			Err(DbError::Internal(msg)) => assert_eq!(msg, "database 'main' is not initialized"),
			_ => panic!("expected not initialized error"),
		}
	}

	#[tokio::test]
	async fn test_initialize_is_idempotent() {
		let mut manager = DatabaseManager::new();
		manager.register(PRIMARY_DATABASE, memory(), true).unwrap();
		manager.initialize().await.unwrap();
		let pool = manager.primary().unwrap();
		sqlx::query("CREATE TABLE marker (id INTEGER)")
			.execute(&pool)
			.await
			.unwrap();

		manager.initialize().await.unwrap();
		let pool = manager.primary().unwrap();
		sqlx::query("SELECT * FROM marker")
			.fetch_all(&pool)
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn test_reader_and_analytics_fall_back_to_primary() {
		let mut manager = DatabaseManager::new();
		manager.register(PRIMARY_DATABASE, memory(), true).unwrap();
		manager.initialize().await.unwrap();
		sqlx::query("CREATE TABLE marker (id INTEGER)")
			.execute(&manager.primary().unwrap())
			.await
			.unwrap();

		for pool in [manager.reader().unwrap(), manager.analytics().unwrap()] {
			sqlx::query("SELECT * FROM marker")
				.fetch_all(&pool)
				.await
				.unwrap();
		}
	}

	#[tokio::test]
	async fn test_reader_prefers_replica() {
		let mut manager = DatabaseManager::new();
		manager.register(PRIMARY_DATABASE, memory(), true).unwrap();
		manager.register(REPLICA_DATABASE, memory(), false).unwrap();
		manager.initialize().await.unwrap();
		sqlx::query("CREATE TABLE replica_only (id INTEGER)")
			.execute(&manager.get(Some(REPLICA_DATABASE)).unwrap())
			.await
			.unwrap();

		let reader = manager.reader().unwrap();
		assert!(sqlx::query("SELECT * FROM replica_only")
			.fetch_all(&reader)
			.await
			.is_ok());
		assert!(sqlx::query("SELECT * FROM replica_only")
			.fetch_all(&manager.primary().unwrap())
			.await
			.is_err());
	}

	#[tokio::test]
	async fn test_health_check_reports_each_database() {
		let mut manager = DatabaseManager::new();
		manager.register(PRIMARY_DATABASE, memory(), true).unwrap();
		manager.initialize().await.unwrap();
		manager.register(ANALYTICS_DATABASE, memory(), false).unwrap();

		let health = manager.health_check().await;
		assert_eq!(health.len(), 2);
		assert!(health[0].healthy);
		assert!(health[0].latency_ms.is_some());
		assert!(!health[1].healthy);
		assert!(health[1].error.as_deref().unwrap().contains("not initialized"));
	}

	#[tokio::test]
	async fn test_upgrade_all_skips_replica() {
		let mut manager = DatabaseManager::new();
		manager.register(PRIMARY_DATABASE, memory(), true).unwrap();
		manager.register(REPLICA_DATABASE, memory(), false).unwrap();
		manager.register(ANALYTICS_DATABASE, memory(), false).unwrap();
		manager.initialize().await.unwrap();

		let upgraded = manager.upgrade_all().await.unwrap();
		let names: Vec<&str> = upgraded.iter().map(|(n, _)| n.as_str()).collect();
		assert_eq!(names, vec![PRIMARY_DATABASE, ANALYTICS_DATABASE]);

		let replica = manager.migration_runner(Some(REPLICA_DATABASE)).unwrap();
		assert_eq!(replica.current().await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_shutdown_closes_pools() {
		let mut manager = DatabaseManager::new();
		manager.register(PRIMARY_DATABASE, memory(), true).unwrap();
		manager.initialize().await.unwrap();
		manager.shutdown().await;
		assert!(matches!(manager.primary(), Err(DbError::Internal(_))));
	}

	#[test]
	fn test_from_config_registers_configured_databases() {
		let config = DatabaseConfig {
			primary: memory(),
			replica: None,
			analytics: Some(memory()),
		};
		let manager = DatabaseManager::from_config(&config).unwrap();
		assert_eq!(manager.names(), vec![PRIMARY_DATABASE, ANALYTICS_DATABASE]);
		assert_eq!(manager.primary_name(), Some(PRIMARY_DATABASE));
	}

	#[tokio::test]
	async fn test_initialize_rejects_unsupported_driver() {
		let mut manager = DatabaseManager::new();
		let config = DatabaseConnectionConfig {
			kind: DatabaseKind::Mysql,
			..Default::default()
		};
		manager.register(PRIMARY_DATABASE, config, true).unwrap();
		assert!(matches!(
			manager.initialize().await,
			Err(DbError::UnsupportedDriver(_))
		));
	}
}
