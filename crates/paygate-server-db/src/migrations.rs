// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Schema migrations.
//!
//! Revisions live in `crates/paygate-server-db/migrations/` as
//! `<version>_<slug>.up.sql` / `<version>_<slug>.down.sql` pairs and are
//! embedded at compile time. Applied versions are tracked in sqlx's
//! `_sqlx_migrations` table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::migrate::Migrator;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, Result};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// A known revision and whether it has been applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationInfo {
	pub version: i64,
	pub description: String,
	pub applied: bool,
	pub installed_on: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct MigrationRunner {
	pool: SqlitePool,
}

impl MigrationRunner {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Apply every pending revision. Returns the versions that were applied.
	#[tracing::instrument(skip(self))]
	pub async fn upgrade(&self) -> Result<Vec<i64>> {
		let pending: Vec<i64> = self.pending().await?.iter().map(|m| m.version).collect();
		MIGRATOR.run(&self.pool).await?;
		for version in &pending {
			info!(version, "applied migration");
		}
		Ok(pending)
	}

	/// Revert applied revisions newer than `target`. `0` reverts everything.
	#[tracing::instrument(skip(self))]
	pub async fn downgrade(&self, target: i64) -> Result<Vec<i64>> {
		let mut reverted: Vec<i64> = self
			.applied()
			.await?
			.into_keys()
			.filter(|v| *v > target)
			.collect();
		reverted.reverse();
		MIGRATOR.undo(&self.pool, target).await?;
		for version in &reverted {
			info!(version, "reverted migration");
		}
		Ok(reverted)
	}

	/// Latest applied version.
	#[tracing::instrument(skip(self))]
	pub async fn current(&self) -> Result<Option<i64>> {
		Ok(self.applied().await?.into_keys().next_back())
	}

	/// Every known revision, oldest first.
	#[tracing::instrument(skip(self))]
	pub async fn history(&self) -> Result<Vec<MigrationInfo>> {
		let applied = self.applied().await?;
		Ok(known_migrations()
			.map(|(version, description)| MigrationInfo {
				version,
				description,
				applied: applied.contains_key(&version),
				installed_on: applied.get(&version).copied().flatten(),
			})
			.collect())
	}

	/// Known revisions that are not applied yet, oldest first.
	#[tracing::instrument(skip(self))]
	pub async fn pending(&self) -> Result<Vec<MigrationInfo>> {
		Ok(self
			.history()
			.await?
			.into_iter()
			.filter(|m| !m.applied)
			.collect())
	}

	async fn applied(&self) -> Result<BTreeMap<i64, Option<DateTime<Utc>>>> {
		let exists: Option<(String,)> = sqlx::query_as(
			"SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
		)
		.fetch_optional(&self.pool)
		.await?;
		if exists.is_none() {
			return Ok(BTreeMap::new());
		}

		let rows: Vec<(i64, Option<String>)> = sqlx::query_as(
			"SELECT version, CAST(installed_on AS TEXT) FROM _sqlx_migrations WHERE success = 1 ORDER BY version",
		)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows
			.into_iter()
			.map(|(version, installed_on)| (version, installed_on.as_deref().and_then(parse_installed_on)))
			.collect())
	}
}

fn known_migrations() -> impl Iterator<Item = (i64, String)> {
	MIGRATOR
		.iter()
		.filter(|m| !m.migration_type.is_down_migration())
		.map(|m| (m.version, m.description.to_string()))
}

fn parse_installed_on(value: &str) -> Option<DateTime<Utc>> {
	if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
		return Some(dt.with_timezone(&Utc));
	}
	NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
		.ok()
		.map(|naive| naive.and_utc())
}

/// Turn a revision message into a file-name slug.
pub fn slugify(message: &str) -> String {
	let mut slug = String::with_capacity(message.len());
	let mut gap = false;
	for c in message.chars() {
		if c.is_ascii_alphanumeric() {
			if gap && !slug.is_empty() {
				slug.push('_');
			}
			gap = false;
			slug.push(c.to_ascii_lowercase());
		} else {
			gap = true;
		}
	}
	if slug.is_empty() {
		"revision".to_string()
	} else {
		slug
	}
}

/// Paths of a generated revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
	pub version: String,
	pub up: PathBuf,
	pub down: PathBuf,
}

/// Write an empty up/down revision pair into `dir`.
///
/// # Errors
/// Returns `DbError::AlreadyExists` if `dir` already holds a revision with
/// the same version, whatever its message.
#[tracing::instrument(skip(dir), fields(dir = %dir.display()))]
pub fn create_revision(dir: &Path, message: &str, now: DateTime<Utc>) -> Result<Revision> {
	let version = now.format("%Y%m%d%H%M%S").to_string();
	let stem = format!("{version}_{}", slugify(message));
	let up = dir.join(format!("{stem}.up.sql"));
	let down = dir.join(format!("{stem}.down.sql"));

	if dir.is_dir() {
		let prefix = format!("{version}_");
		for entry in std::fs::read_dir(dir)? {
			let entry = entry?;
			if entry.file_name().to_string_lossy().starts_with(&prefix) {
				return Err(DbError::AlreadyExists(entry.path().display().to_string()));
			}
		}
	}

	std::fs::create_dir_all(dir)?;
	// Header comments are single lines.
	let message = message.split_whitespace().collect::<Vec<_>>().join(" ");
	let created = now.to_rfc3339();
	std::fs::write(
		&up,
		format!("-- {message}\n-- Created: {created}\n\n-- Write the upgrade statements here.\n"),
	)?;
	std::fs::write(
		&down,
		format!("-- Revert: {message}\n-- Created: {created}\n\n-- Undo the upgrade statements here.\n"),
	)?;

	info!(up = %up.display(), down = %down.display(), "created revision");
	Ok(Revision { version, up, down })
}
