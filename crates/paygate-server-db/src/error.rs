// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::filter::FilterError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Migration error: {0}")]
	Migration(#[from] sqlx::migrate::MigrateError),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("Invalid filter: {0}")]
	Filter(#[from] FilterError),

	#[error("Unsupported database driver: {0}")]
	UnsupportedDriver(String),

	#[error("Domain error: {0}")]
	Domain(#[from] paygate_core::DomainError),

	#[error("Revision already exists: {0}")]
	AlreadyExists(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl DbError {
	/// True when the underlying error is a UNIQUE or PRIMARY KEY violation.
	pub fn is_unique_violation(&self) -> bool {
		match self {
			DbError::Sqlx(sqlx::Error::Database(e)) => e.is_unique_violation(),
			_ => false,
		}
	}

	/// Turn a unique violation into `Conflict`, leaving other errors untouched.
	pub(crate) fn or_conflict(self, message: impl FnOnce() -> String) -> Self {
		if self.is_unique_violation() {
			DbError::Conflict(message())
		} else {
			self
		}
	}
}

pub type Result<T> = std::result::Result<T, DbError>;
