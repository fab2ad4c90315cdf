// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Payment methods, gateways, method-to-gateway routing and gateway credentials.

use paygate_core::{GatewayCredential, PaymentGateway, PaymentMethod, PaymentMethodGateway};
use sqlx::SqlitePool;

use crate::error::{DbError, Result};
use crate::{json, time};

const METHOD_COLUMNS: &str = "id, method_code, method_name, method_type, provider, icon_url, is_active, admin_fee, admin_fee_type, created_at, updated_at";
const GATEWAY_COLUMNS: &str = "id, gateway_code, gateway_name, gateway_type, base_url, is_active, is_sandbox, priority, supported_methods, created_at, updated_at";
const CREDENTIAL_COLUMNS: &str = "id, application_id, gateway_id, merchant_id, api_key, api_secret, client_key, webhook_secret, additional_config, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct PaymentMethodRepository {
	pool: SqlitePool,
}

impl PaymentMethodRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, method), fields(method_id = %method.id, method_code = %method.method_code))]
	pub async fn create_method(&self, method: &PaymentMethod) -> Result<()> {
		sqlx::query(
			r#"
            INSERT INTO payment_methods (id, method_code, method_name, method_type, provider, icon_url,
                                         is_active, admin_fee, admin_fee_type, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
		)
		.bind(&method.id)
		.bind(&method.method_code)
		.bind(&method.method_name)
		.bind(method.method_type.as_str())
		.bind(&method.provider)
		.bind(&method.icon_url)
		.bind(method.is_active)
		.bind(method.admin_fee)
		.bind(method.admin_fee_type.as_str())
		.bind(time::encode(method.created_at))
		.bind(time::encode(method.updated_at))
		.execute(&self.pool)
		.await
		.map_err(|e| {
			DbError::from(e).or_conflict(|| {
				format!("payment method code '{}' already exists", method.method_code)
			})
		})?;

		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_method(&self, id: &str) -> Result<Option<PaymentMethod>> {
		let row = sqlx::query_as::<_, PaymentMethodRow>(&format!(
			"SELECT {METHOD_COLUMNS} FROM payment_methods WHERE id = ?"
		))
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_method_by_code(&self, method_code: &str) -> Result<Option<PaymentMethod>> {
		let row = sqlx::query_as::<_, PaymentMethodRow>(&format!(
			"SELECT {METHOD_COLUMNS} FROM payment_methods WHERE method_code = ?"
		))
		.bind(method_code)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_active_methods(&self) -> Result<Vec<PaymentMethod>> {
		let rows = sqlx::query_as::<_, PaymentMethodRow>(&format!(
			"SELECT {METHOD_COLUMNS} FROM payment_methods WHERE is_active = 1 ORDER BY method_type, method_name"
		))
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[tracing::instrument(skip(self, gateway), fields(gateway_id = %gateway.id, gateway_code = %gateway.gateway_code))]
	pub async fn create_gateway(&self, gateway: &PaymentGateway) -> Result<()> {
		sqlx::query(
			r#"
            INSERT INTO payment_gateways (id, gateway_code, gateway_name, gateway_type, base_url, is_active,
                                          is_sandbox, priority, supported_methods, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
		)
		.bind(&gateway.id)
		.bind(&gateway.gateway_code)
		.bind(&gateway.gateway_name)
		.bind(gateway.gateway_type.as_str())
		.bind(&gateway.base_url)
		.bind(gateway.is_active)
		.bind(gateway.is_sandbox)
		.bind(gateway.priority)
		.bind(json::encode_opt(gateway.supported_methods.as_ref()))
		.bind(time::encode(gateway.created_at))
		.bind(time::encode(gateway.updated_at))
		.execute(&self.pool)
		.await
		.map_err(|e| {
			DbError::from(e).or_conflict(|| {
				format!("gateway code '{}' already exists", gateway.gateway_code)
			})
		})?;

		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_gateway(&self, id: &str) -> Result<Option<PaymentGateway>> {
		let row = sqlx::query_as::<_, PaymentGatewayRow>(&format!(
			"SELECT {GATEWAY_COLUMNS} FROM payment_gateways WHERE id = ?"
		))
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_gateway_by_code(&self, gateway_code: &str) -> Result<Option<PaymentGateway>> {
		let row = sqlx::query_as::<_, PaymentGatewayRow>(&format!(
			"SELECT {GATEWAY_COLUMNS} FROM payment_gateways WHERE gateway_code = ?"
		))
		.bind(gateway_code)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[tracing::instrument(skip(self, link), fields(payment_method_id = %link.payment_method_id, gateway_id = %link.gateway_id))]
	pub async fn link_method_gateway(&self, link: &PaymentMethodGateway) -> Result<()> {
		sqlx::query(
			r#"
            INSERT INTO payment_method_gateways (id, payment_method_id, gateway_id, gateway_method_code,
                                                 is_active, processing_time_minutes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
		)
		.bind(&link.id)
		.bind(&link.payment_method_id)
		.bind(&link.gateway_id)
		.bind(&link.gateway_method_code)
		.bind(link.is_active)
		.bind(link.processing_time_minutes)
		.bind(time::encode(link.created_at))
		.bind(time::encode(link.updated_at))
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	/// Gateway that should process `payment_method_id`: an active link to an
	/// active gateway, highest priority first, then the oldest gateway.
	#[tracing::instrument(skip(self))]
	pub async fn select_gateway_for_method(
		&self,
		payment_method_id: &str,
	) -> Result<Option<PaymentGateway>> {
		let row = sqlx::query_as::<_, PaymentGatewayRow>(
			r#"
            SELECT g.id, g.gateway_code, g.gateway_name, g.gateway_type, g.base_url, g.is_active,
                   g.is_sandbox, g.priority, g.supported_methods, g.created_at, g.updated_at
            FROM payment_method_gateways pmg
            JOIN payment_gateways g ON g.id = pmg.gateway_id
            WHERE pmg.payment_method_id = ?
              AND pmg.is_active = 1
              AND g.is_active = 1
            ORDER BY g.priority DESC, g.created_at ASC
            LIMIT 1
            "#,
		)
		.bind(payment_method_id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	/// Insert or replace the credential for an (application, gateway) pair.
	#[tracing::instrument(skip(self, credential), fields(application_id = %credential.application_id, gateway_id = %credential.gateway_id))]
	pub async fn upsert_credential(&self, credential: &GatewayCredential) -> Result<()> {
		sqlx::query(
			r#"
            INSERT INTO payment_gateway_credentials (id, application_id, gateway_id, merchant_id, api_key,
                                                     api_secret, client_key, webhook_secret, additional_config,
                                                     is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(application_id, gateway_id) DO UPDATE SET
                merchant_id = excluded.merchant_id,
                api_key = excluded.api_key,
                api_secret = excluded.api_secret,
                client_key = excluded.client_key,
                webhook_secret = excluded.webhook_secret,
                additional_config = excluded.additional_config,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at
            "#,
		)
		.bind(&credential.id)
		.bind(&credential.application_id)
		.bind(&credential.gateway_id)
		.bind(&credential.merchant_id)
		.bind(&credential.api_key)
		.bind(&credential.api_secret)
		.bind(&credential.client_key)
		.bind(&credential.webhook_secret)
		.bind(json::encode_opt(credential.additional_config.as_ref()))
		.bind(credential.is_active)
		.bind(time::encode(credential.created_at))
		.bind(time::encode(credential.updated_at))
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_active_credential(
		&self,
		gateway_id: &str,
		application_id: &str,
	) -> Result<Option<GatewayCredential>> {
		let row = sqlx::query_as::<_, CredentialRow>(&format!(
			"SELECT {CREDENTIAL_COLUMNS} FROM payment_gateway_credentials WHERE gateway_id = ? AND application_id = ? AND is_active = 1"
		))
		.bind(gateway_id)
		.bind(application_id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}
}

#[derive(sqlx::FromRow)]
struct PaymentMethodRow {
	id: String,
	method_code: String,
	method_name: String,
	method_type: String,
	provider: Option<String>,
	icon_url: Option<String>,
	is_active: bool,
	admin_fee: f64,
	admin_fee_type: String,
	created_at: String,
	updated_at: String,
}

impl TryFrom<PaymentMethodRow> for PaymentMethod {
	type Error = DbError;

	fn try_from(row: PaymentMethodRow) -> Result<Self> {
		Ok(PaymentMethod {
			id: row.id,
			method_code: row.method_code,
			method_name: row.method_name,
			method_type: row.method_type.parse()?,
			provider: row.provider,
			icon_url: row.icon_url,
			is_active: row.is_active,
			admin_fee: row.admin_fee,
			admin_fee_type: row.admin_fee_type.parse()?,
			created_at: time::decode("created_at", &row.created_at)?,
			updated_at: time::decode("updated_at", &row.updated_at)?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct PaymentGatewayRow {
	id: String,
	gateway_code: String,
	gateway_name: String,
	gateway_type: String,
	base_url: String,
	is_active: bool,
	is_sandbox: bool,
	priority: i64,
	supported_methods: Option<String>,
	created_at: String,
	updated_at: String,
}

impl TryFrom<PaymentGatewayRow> for PaymentGateway {
	type Error = DbError;

	fn try_from(row: PaymentGatewayRow) -> Result<Self> {
		Ok(PaymentGateway {
			id: row.id,
			gateway_code: row.gateway_code,
			gateway_name: row.gateway_name,
			gateway_type: row.gateway_type.parse()?,
			base_url: row.base_url,
			is_active: row.is_active,
			is_sandbox: row.is_sandbox,
			priority: row.priority,
			supported_methods: json::decode_opt(row.supported_methods)?,
			created_at: time::decode("created_at", &row.created_at)?,
			updated_at: time::decode("updated_at", &row.updated_at)?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
	id: String,
	application_id: String,
	gateway_id: String,
	merchant_id: Option<String>,
	api_key: Option<String>,
	api_secret: Option<String>,
	client_key: Option<String>,
	webhook_secret: Option<String>,
	additional_config: Option<String>,
	is_active: bool,
	created_at: String,
	updated_at: String,
}

impl TryFrom<CredentialRow> for GatewayCredential {
	type Error = DbError;

	fn try_from(row: CredentialRow) -> Result<Self> {
		Ok(GatewayCredential {
			id: row.id,
			application_id: row.application_id,
			gateway_id: row.gateway_id,
			merchant_id: row.merchant_id,
			api_key: row.api_key,
			api_secret: row.api_secret,
			client_key: row.client_key,
			webhook_secret: row.webhook_secret,
			additional_config: json::decode_opt(row.additional_config)?,
			is_active: row.is_active,
			created_at: time::decode("created_at", &row.created_at)?,
			updated_at: time::decode("updated_at", &row.updated_at)?,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{self, create_test_pool};
	use paygate_core::{AdminFeeType, GatewayType};

	#[tokio::test]
	async fn test_method_lookup_and_active_listing() {
		let repo = PaymentMethodRepository::new(create_test_pool().await);
		let bca = testing::payment_method("BCA_VA", AdminFeeType::Fixed, 4_000.0);
		let mut ovo = testing::payment_method("OVO", AdminFeeType::Percentage, 1.5);
		ovo.is_active = false;
		repo.create_method(&bca).await.unwrap();
		repo.create_method(&ovo).await.unwrap();

		assert_eq!(repo.get_method(&bca.id).await.unwrap(), Some(bca.clone()));
		assert_eq!(repo.get_method_by_code("OVO").await.unwrap(), Some(ovo));
		assert_eq!(repo.list_active_methods().await.unwrap(), vec![bca.clone()]);

		let duplicate = testing::payment_method("BCA_VA", AdminFeeType::Fixed, 0.0);
		assert!(matches!(
			repo.create_method(&duplicate).await,
			Err(DbError::Conflict(_))
		));
	}

	#[tokio::test]
	async fn test_select_gateway_prefers_priority_then_age() {
		let repo = PaymentMethodRepository::new(create_test_pool().await);
		let method = testing::payment_method("BCA_VA", AdminFeeType::Fixed, 4_000.0);
		repo.create_method(&method).await.unwrap();
		assert!(repo.select_gateway_for_method(&method.id).await.unwrap().is_none());

		let older = testing::gateway("midtrans", GatewayType::Midtrans, 5);
		let mut newer = testing::gateway("xendit", GatewayType::Xendit, 5);
		newer.created_at = older.created_at + chrono::Duration::seconds(1);
		let mut best_but_inactive = testing::gateway("doku", GatewayType::Doku, 10);
		best_but_inactive.is_active = false;
		for gateway in [&older, &newer, &best_but_inactive] {
			repo.create_gateway(gateway).await.unwrap();
			repo.link_method_gateway(&testing::method_gateway(&method.id, &gateway.id))
				.await
				.unwrap();
		}

		let selected = repo.select_gateway_for_method(&method.id).await.unwrap().unwrap();
		assert_eq!(selected.id, older.id);

		let mut top = testing::gateway("nicepay", GatewayType::Nicepay, 7);
		top.created_at = newer.created_at;
		repo.create_gateway(&top).await.unwrap();
		let mut link = testing::method_gateway(&method.id, &top.id);
		link.is_active = false;
		repo.link_method_gateway(&link).await.unwrap();
		let selected = repo.select_gateway_for_method(&method.id).await.unwrap().unwrap();
		assert_eq!(selected.id, older.id);

		assert_eq!(
			repo.get_gateway_by_code("xendit").await.unwrap(),
			Some(newer.clone())
		);
		assert_eq!(repo.get_gateway(&newer.id).await.unwrap(), Some(newer));
	}

	#[tokio::test]
	async fn test_upsert_credential_replaces_secret() {
		let pool = create_test_pool().await;
		let app = testing::seed_application(&pool, "shop").await;
		let repo = PaymentMethodRepository::new(pool);
		let gateway = testing::gateway("midtrans", GatewayType::Midtrans, 1);
		repo.create_gateway(&gateway).await.unwrap();

		let credential = testing::credential(&app.id, &gateway.id, Some("first"));
		repo.upsert_credential(&credential).await.unwrap();
		let mut rotated = testing::credential(&app.id, &gateway.id, Some("second"));
		rotated.additional_config = Some(serde_json::json!({"region": "id"}));
		repo.upsert_credential(&rotated).await.unwrap();

		let stored = repo
			.get_active_credential(&gateway.id, &app.id)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(stored.id, credential.id);
		assert_eq!(stored.webhook_secret.as_deref(), Some("second"));
		assert_eq!(stored.additional_config, rotated.additional_config);

		rotated.is_active = false;
		repo.upsert_credential(&rotated).await.unwrap();
		assert!(repo
			.get_active_credential(&gateway.id, &app.id)
			.await
			.unwrap()
			.is_none());
	}
}
