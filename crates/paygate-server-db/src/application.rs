// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{DbError, Result};
use crate::time;

/// A client application that owns products, vouchers and gateway credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
	pub id: String,
	pub app_code: String,
	pub app_name: String,
	pub description: Option<String>,
	pub is_active: bool,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ApplicationRepository {
	pool: SqlitePool,
}

impl ApplicationRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// # Errors
	/// Returns `DbError::Conflict` if `app_code` is taken.
	#[tracing::instrument(skip(self, app), fields(application_id = %app.id, app_code = %app.app_code))]
	pub async fn create(&self, app: &Application) -> Result<()> {
		sqlx::query(
			r#"
            INSERT INTO applications (id, app_code, app_name, description, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
		)
		.bind(&app.id)
		.bind(&app.app_code)
		.bind(&app.app_name)
		.bind(&app.description)
		.bind(app.is_active)
		.bind(time::encode(app.created_at))
		.bind(time::encode(app.updated_at))
		.execute(&self.pool)
		.await
		.map_err(|e| {
			DbError::from(e).or_conflict(|| format!("application code '{}' already exists", app.app_code))
		})?;

		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get(&self, id: &str) -> Result<Option<Application>> {
		let row = sqlx::query_as::<_, ApplicationRow>(
			"SELECT id, app_code, app_name, description, is_active, created_at, updated_at FROM applications WHERE id = ?",
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_by_code(&self, app_code: &str) -> Result<Option<Application>> {
		let row = sqlx::query_as::<_, ApplicationRow>(
			"SELECT id, app_code, app_name, description, is_active, created_at, updated_at FROM applications WHERE app_code = ?",
		)
		.bind(app_code)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}
}

#[derive(sqlx::FromRow)]
struct ApplicationRow {
	id: String,
	app_code: String,
	app_name: String,
	description: Option<String>,
	is_active: bool,
	created_at: String,
	updated_at: String,
}

impl TryFrom<ApplicationRow> for Application {
	type Error = DbError;

	fn try_from(row: ApplicationRow) -> Result<Self> {
		Ok(Application {
			id: row.id,
			app_code: row.app_code,
			app_name: row.app_name,
			description: row.description,
			is_active: row.is_active,
			created_at: time::decode("created_at", &row.created_at)?,
			updated_at: time::decode("updated_at", &row.updated_at)?,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{application, create_test_pool};

	#[tokio::test]
	async fn test_create_and_lookup() {
		let repo = ApplicationRepository::new(create_test_pool().await);
		let app = application("shop");
		repo.create(&app).await.unwrap();

		assert_eq!(repo.get(&app.id).await.unwrap(), Some(app.clone()));
		assert_eq!(repo.get_by_code("shop").await.unwrap(), Some(app));
		assert!(repo.get("missing").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_duplicate_code_conflicts() {
		let repo = ApplicationRepository::new(create_test_pool().await);
		repo.create(&application("shop")).await.unwrap();
		let result = repo.create(&application("shop")).await;
		assert!(matches!(result, Err(DbError::Conflict(_))));
	}
}
