// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use paygate_core::{Voucher, VoucherCondition, VoucherEligibleUser, VoucherUsage};
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::{DbError, Result};
use crate::filter::{paginate, ColumnKind, FilterSchema, ListQuery, Page};
use crate::pool::begin_write;
use crate::{json, time};

pub const VOUCHER_FILTER: FilterSchema = FilterSchema {
	table: "vouchers",
	columns: &[
		("id", ColumnKind::Text),
		("application_id", ColumnKind::Text),
		("voucher_code", ColumnKind::Text),
		("voucher_name", ColumnKind::Text),
		("description", ColumnKind::Text),
		("voucher_type", ColumnKind::Text),
		("discount_type", ColumnKind::Text),
		("discount_value", ColumnKind::Real),
		("max_discount", ColumnKind::Integer),
		("min_transaction", ColumnKind::Integer),
		("usage_limit", ColumnKind::Integer),
		("usage_count", ColumnKind::Integer),
		("usage_limit_per_user", ColumnKind::Integer),
		("valid_from", ColumnKind::Timestamp),
		("valid_until", ColumnKind::Timestamp),
		("is_active", ColumnKind::Bool),
		("is_auto_apply", ColumnKind::Bool),
		("created_at", ColumnKind::Timestamp),
		("updated_at", ColumnKind::Timestamp),
	],
	default_order: "created_at DESC",
};

const VOUCHER_COLUMNS: &str = "id, application_id, voucher_code, voucher_name, description, voucher_type, discount_type, discount_value, max_discount, min_transaction, usage_limit, usage_count, usage_limit_per_user, valid_from, valid_until, is_active, is_auto_apply, applicable_products, created_at, updated_at";
const ELIGIBILITY_COLUMNS: &str = "id, voucher_id, user_id, application_id, eligible_at, notified_at, expires_at, is_claimed, claimed_at";

/// Fields that may change after a voucher is created. `None` leaves the
/// stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoucherUpdate {
	pub voucher_name: Option<String>,
	pub description: Option<String>,
	pub discount_value: Option<f64>,
	pub max_discount: Option<i64>,
	pub min_transaction: Option<i64>,
	pub usage_limit: Option<i64>,
	pub usage_limit_per_user: Option<i64>,
	pub valid_from: Option<DateTime<Utc>>,
	pub valid_until: Option<DateTime<Utc>>,
	pub is_active: Option<bool>,
	pub is_auto_apply: Option<bool>,
	pub applicable_products: Option<Value>,
}

impl VoucherUpdate {
	fn apply(self, voucher: &mut Voucher) {
		if let Some(v) = self.voucher_name {
			voucher.voucher_name = v;
		}
		if let Some(v) = self.description {
			voucher.description = Some(v);
		}
		if let Some(v) = self.discount_value {
			voucher.discount_value = v;
		}
		if let Some(v) = self.max_discount {
			voucher.max_discount = Some(v);
		}
		if let Some(v) = self.min_transaction {
			voucher.min_transaction = v;
		}
		if let Some(v) = self.usage_limit {
			voucher.usage_limit = Some(v);
		}
		if let Some(v) = self.usage_limit_per_user {
			voucher.usage_limit_per_user = Some(v);
		}
		if let Some(v) = self.valid_from {
			voucher.valid_from = Some(v);
		}
		if let Some(v) = self.valid_until {
			voucher.valid_until = Some(v);
		}
		if let Some(v) = self.is_active {
			voucher.is_active = v;
		}
		if let Some(v) = self.is_auto_apply {
			voucher.is_auto_apply = v;
		}
		if let Some(v) = self.applicable_products {
			voucher.applicable_products = Some(v);
		}
	}
}

#[derive(Clone)]
pub struct VoucherRepository {
	pool: SqlitePool,
}

impl VoucherRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// # Errors
	/// Returns `DbError::Conflict` if `voucher_code` is taken.
	#[tracing::instrument(skip(self, voucher), fields(voucher_id = %voucher.id, voucher_code = %voucher.voucher_code))]
	pub async fn create(&self, voucher: &Voucher) -> Result<()> {
		sqlx::query(
			r#"
            INSERT INTO vouchers (id, application_id, voucher_code, voucher_name, description, voucher_type,
                                  discount_type, discount_value, max_discount, min_transaction, usage_limit,
                                  usage_count, usage_limit_per_user, valid_from, valid_until, is_active,
                                  is_auto_apply, applicable_products, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
		)
		.bind(&voucher.id)
		.bind(&voucher.application_id)
		.bind(&voucher.voucher_code)
		.bind(&voucher.voucher_name)
		.bind(&voucher.description)
		.bind(voucher.voucher_type.as_str())
		.bind(voucher.discount_type.as_str())
		.bind(voucher.discount_value)
		.bind(voucher.max_discount)
		.bind(voucher.min_transaction)
		.bind(voucher.usage_limit)
		.bind(voucher.usage_count)
		.bind(voucher.usage_limit_per_user)
		.bind(time::encode_opt(voucher.valid_from))
		.bind(time::encode_opt(voucher.valid_until))
		.bind(voucher.is_active)
		.bind(voucher.is_auto_apply)
		.bind(json::encode_opt(voucher.applicable_products.as_ref()))
		.bind(time::encode(voucher.created_at))
		.bind(time::encode(voucher.updated_at))
		.execute(&self.pool)
		.await
		.map_err(|e| {
			DbError::from(e).or_conflict(|| {
				format!("voucher code '{}' already exists", voucher.voucher_code)
			})
		})?;

		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get(&self, id: &str) -> Result<Option<Voucher>> {
		let row = sqlx::query_as::<_, VoucherRow>(&format!(
			"SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE id = ?"
		))
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_by_code(&self, voucher_code: &str) -> Result<Option<Voucher>> {
		let row = sqlx::query_as::<_, VoucherRow>(&format!(
			"SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE voucher_code = ?"
		))
		.bind(voucher_code)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	/// Apply a partial update and return the stored voucher.
	#[tracing::instrument(skip(self, update))]
	pub async fn update(&self, id: &str, update: VoucherUpdate) -> Result<Voucher> {
		let mut voucher = self
			.get(id)
			.await?
			.ok_or_else(|| DbError::NotFound(format!("voucher {id}")))?;
		update.apply(&mut voucher);
		voucher.updated_at = time::now();

		sqlx::query(
			r#"
            UPDATE vouchers
            SET voucher_name = ?, description = ?, discount_value = ?, max_discount = ?,
                min_transaction = ?, usage_limit = ?, usage_limit_per_user = ?, valid_from = ?,
                valid_until = ?, is_active = ?, is_auto_apply = ?, applicable_products = ?, updated_at = ?
            WHERE id = ?
            "#,
		)
		.bind(&voucher.voucher_name)
		.bind(&voucher.description)
		.bind(voucher.discount_value)
		.bind(voucher.max_discount)
		.bind(voucher.min_transaction)
		.bind(voucher.usage_limit)
		.bind(voucher.usage_limit_per_user)
		.bind(time::encode_opt(voucher.valid_from))
		.bind(time::encode_opt(voucher.valid_until))
		.bind(voucher.is_active)
		.bind(voucher.is_auto_apply)
		.bind(json::encode_opt(voucher.applicable_products.as_ref()))
		.bind(time::encode(voucher.updated_at))
		.bind(id)
		.execute(&self.pool)
		.await?;

		Ok(voucher)
	}

	#[tracing::instrument(skip(self, query), fields(limit = query.limit, offset = query.offset))]
	pub async fn list(&self, query: &ListQuery) -> Result<Page<Voucher>> {
		paginate::<VoucherRow, Voucher>(&self.pool, &VOUCHER_FILTER, VOUCHER_COLUMNS, query).await
	}

	/// Active public vouchers that are redeemable at `now`.
	#[tracing::instrument(skip(self))]
	pub async fn list_public(&self, now: DateTime<Utc>) -> Result<Vec<Voucher>> {
		let now = time::encode(now);
		let rows = sqlx::query_as::<_, VoucherRow>(&format!(
			r#"
            SELECT {VOUCHER_COLUMNS} FROM vouchers
            WHERE is_active = 1
              AND voucher_type = 'public'
              AND (valid_from IS NULL OR valid_from <= ?)
              AND (valid_until IS NULL OR valid_until >= ?)
              AND (usage_limit IS NULL OR usage_count < usage_limit)
            ORDER BY created_at DESC
            "#
		))
		.bind(&now)
		.bind(&now)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[tracing::instrument(skip(self, condition), fields(voucher_id = %condition.voucher_id))]
	pub async fn add_condition(&self, condition: &VoucherCondition) -> Result<()> {
		sqlx::query(
			r#"
            INSERT INTO voucher_conditions (id, voucher_id, condition_type, operator, condition_value,
                                            is_required, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
		)
		.bind(&condition.id)
		.bind(&condition.voucher_id)
		.bind(condition.condition_type.as_str())
		.bind(condition.operator.as_str())
		.bind(condition.condition_value.to_string())
		.bind(condition.is_required)
		.bind(time::encode(condition.created_at))
		.bind(time::encode(condition.updated_at))
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_conditions(&self, voucher_id: &str) -> Result<Vec<VoucherCondition>> {
		let rows = sqlx::query_as::<_, ConditionRow>(
			r#"
            SELECT id, voucher_id, condition_type, operator, condition_value, is_required, created_at, updated_at
            FROM voucher_conditions
            WHERE voucher_id = ?
            ORDER BY created_at, id
            "#,
		)
		.bind(voucher_id)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	/// Grant `user_ids` access to a voucher. Users who already have a grant
	/// are skipped. Returns the number of new grants.
	#[tracing::instrument(skip(self, user_ids), fields(users = user_ids.len()))]
	pub async fn add_eligible_users(
		&self,
		voucher_id: &str,
		application_id: &str,
		user_ids: &[String],
		expires_at: Option<DateTime<Utc>>,
		now: DateTime<Utc>,
	) -> Result<u64> {
		let mut tx = begin_write(&self.pool).await?;

		let exists = sqlx::query_as::<_, (String,)>("SELECT id FROM vouchers WHERE id = ?")
			.bind(voucher_id)
			.fetch_optional(&mut *tx)
			.await?;
		if exists.is_none() {
			return Err(DbError::NotFound(format!("voucher {voucher_id}")));
		}

		let mut inserted = 0;
		for user_id in user_ids {
			let result = sqlx::query(
				r#"
                INSERT OR IGNORE INTO voucher_eligible_users (id, voucher_id, user_id, application_id,
                                                              eligible_at, expires_at, is_claimed)
                VALUES (?, ?, ?, ?, ?, ?, 0)
                "#,
			)
			.bind(Uuid::new_v4().to_string())
			.bind(voucher_id)
			.bind(user_id)
			.bind(application_id)
			.bind(time::encode(now))
			.bind(time::encode_opt(expires_at))
			.execute(&mut *tx)
			.await?;
			inserted += result.rows_affected();
		}

		tx.commit().await?;
		tracing::info!(voucher_id, inserted, "granted voucher eligibility");
		Ok(inserted)
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_eligibility(
		&self,
		voucher_id: &str,
		user_id: &str,
	) -> Result<Option<VoucherEligibleUser>> {
		let row = sqlx::query_as::<_, EligibilityRow>(&format!(
			"SELECT {ELIGIBILITY_COLUMNS} FROM voucher_eligible_users WHERE voucher_id = ? AND user_id = ?"
		))
		.bind(voucher_id)
		.bind(user_id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	/// Active vouchers the user holds an unexpired grant for.
	#[tracing::instrument(skip(self))]
	pub async fn list_user_vouchers(
		&self,
		user_id: &str,
		now: DateTime<Utc>,
	) -> Result<Vec<Voucher>> {
		let now = time::encode(now);
		let columns = VOUCHER_COLUMNS
			.split(", ")
			.map(|c| format!("v.{c}"))
			.collect::<Vec<_>>()
			.join(", ");
		let rows = sqlx::query_as::<_, VoucherRow>(&format!(
			r#"
            SELECT {columns}
            FROM voucher_eligible_users e
            JOIN vouchers v ON v.id = e.voucher_id
            WHERE e.user_id = ?
              AND (e.expires_at IS NULL OR e.expires_at > ?)
              AND v.is_active = 1
              AND (v.valid_until IS NULL OR v.valid_until >= ?)
            ORDER BY e.eligible_at DESC
            "#
		))
		.bind(user_id)
		.bind(&now)
		.bind(&now)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	/// Mark a grant as claimed.
	///
	/// # Errors
	/// Returns `DbError::NotFound` when the user has no live grant and
	/// `DbError::Conflict` when it was already claimed.
	#[tracing::instrument(skip(self))]
	pub async fn claim(
		&self,
		voucher_id: &str,
		user_id: &str,
		now: DateTime<Utc>,
	) -> Result<VoucherEligibleUser> {
		let mut tx = begin_write(&self.pool).await?;

		let row = sqlx::query_as::<_, EligibilityRow>(&format!(
			"SELECT {ELIGIBILITY_COLUMNS} FROM voucher_eligible_users WHERE voucher_id = ? AND user_id = ?"
		))
		.bind(voucher_id)
		.bind(user_id)
		.fetch_optional(&mut *tx)
		.await?;
		let mut eligibility: VoucherEligibleUser = match row {
			Some(row) => row.try_into()?,
			None => {
				return Err(DbError::NotFound(format!(
					"eligibility of user {user_id} for voucher {voucher_id}"
				)))
			}
		};
		if eligibility.is_expired(now) {
			return Err(DbError::NotFound(format!(
				"unexpired eligibility of user {user_id} for voucher {voucher_id}"
			)));
		}
		if eligibility.is_claimed {
			return Err(DbError::Conflict(format!(
				"voucher {voucher_id} already claimed by user {user_id}"
			)));
		}

		sqlx::query("UPDATE voucher_eligible_users SET is_claimed = 1, claimed_at = ? WHERE id = ?")
			.bind(time::encode(now))
			.bind(&eligibility.id)
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;

		eligibility.is_claimed = true;
		eligibility.claimed_at = Some(now);
		Ok(eligibility)
	}

	#[tracing::instrument(skip(self))]
	pub async fn count_user_usage(&self, voucher_id: &str, user_id: &str) -> Result<i64> {
		let (count,) = sqlx::query_as::<_, (i64,)>(
			"SELECT COUNT(*) FROM voucher_usage WHERE voucher_id = ? AND user_id = ?",
		)
		.bind(voucher_id)
		.bind(user_id)
		.fetch_one(&self.pool)
		.await?;

		Ok(count)
	}
}

/// Record a redemption and bump `usage_count`, refusing once `usage_limit` is hit.
pub(crate) async fn record_usage_on(
	conn: &mut SqliteConnection,
	usage: &VoucherUsage,
) -> Result<()> {
	let updated = sqlx::query(
		r#"
        UPDATE vouchers
        SET usage_count = usage_count + 1, updated_at = ?
        WHERE id = ? AND (usage_limit IS NULL OR usage_count < usage_limit)
        "#,
	)
	.bind(time::encode(usage.used_at))
	.bind(&usage.voucher_id)
	.execute(&mut *conn)
	.await?;
	if updated.rows_affected() == 0 {
		return Err(DbError::Conflict(format!(
			"voucher {} has reached its usage limit",
			usage.voucher_id
		)));
	}

	sqlx::query(
		r#"
        INSERT INTO voucher_usage (id, voucher_id, user_id, application_id, transaction_id, used_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
	)
	.bind(&usage.id)
	.bind(&usage.voucher_id)
	.bind(&usage.user_id)
	.bind(&usage.application_id)
	.bind(&usage.transaction_id)
	.bind(time::encode(usage.used_at))
	.execute(&mut *conn)
	.await?;

	Ok(())
}

#[derive(sqlx::FromRow)]
struct VoucherRow {
	id: String,
	application_id: String,
	voucher_code: String,
	voucher_name: String,
	description: Option<String>,
	voucher_type: String,
	discount_type: String,
	discount_value: f64,
	max_discount: Option<i64>,
	min_transaction: i64,
	usage_limit: Option<i64>,
	usage_count: i64,
	usage_limit_per_user: Option<i64>,
	valid_from: Option<String>,
	valid_until: Option<String>,
	is_active: bool,
	is_auto_apply: bool,
	applicable_products: Option<String>,
	created_at: String,
	updated_at: String,
}

impl TryFrom<VoucherRow> for Voucher {
	type Error = DbError;

	fn try_from(row: VoucherRow) -> Result<Self> {
		Ok(Voucher {
			id: row.id,
			application_id: row.application_id,
			voucher_code: row.voucher_code,
			voucher_name: row.voucher_name,
			description: row.description,
			voucher_type: row.voucher_type.parse()?,
			discount_type: row.discount_type.parse()?,
			discount_value: row.discount_value,
			max_discount: row.max_discount,
			min_transaction: row.min_transaction,
			usage_limit: row.usage_limit,
			usage_count: row.usage_count,
			usage_limit_per_user: row.usage_limit_per_user,
			valid_from: time::decode_opt("valid_from", row.valid_from)?,
			valid_until: time::decode_opt("valid_until", row.valid_until)?,
			is_active: row.is_active,
			is_auto_apply: row.is_auto_apply,
			applicable_products: json::decode_opt(row.applicable_products)?,
			created_at: time::decode("created_at", &row.created_at)?,
			updated_at: time::decode("updated_at", &row.updated_at)?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct ConditionRow {
	id: String,
	voucher_id: String,
	condition_type: String,
	operator: String,
	condition_value: String,
	is_required: bool,
	created_at: String,
	updated_at: String,
}

impl TryFrom<ConditionRow> for VoucherCondition {
	type Error = DbError;

	fn try_from(row: ConditionRow) -> Result<Self> {
		Ok(VoucherCondition {
			id: row.id,
			voucher_id: row.voucher_id,
			condition_type: row.condition_type.parse()?,
			operator: row.operator.parse()?,
			condition_value: json::decode(&row.condition_value)?,
			is_required: row.is_required,
			created_at: time::decode("created_at", &row.created_at)?,
			updated_at: time::decode("updated_at", &row.updated_at)?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct EligibilityRow {
	id: String,
	voucher_id: String,
	user_id: String,
	application_id: String,
	eligible_at: String,
	notified_at: Option<String>,
	expires_at: Option<String>,
	is_claimed: bool,
	claimed_at: Option<String>,
}

impl TryFrom<EligibilityRow> for VoucherEligibleUser {
	type Error = DbError;

	fn try_from(row: EligibilityRow) -> Result<Self> {
		Ok(VoucherEligibleUser {
			id: row.id,
			voucher_id: row.voucher_id,
			user_id: row.user_id,
			application_id: row.application_id,
			eligible_at: time::decode("eligible_at", &row.eligible_at)?,
			notified_at: time::decode_opt("notified_at", row.notified_at)?,
			expires_at: time::decode_opt("expires_at", row.expires_at)?,
			is_claimed: row.is_claimed,
			claimed_at: time::decode_opt("claimed_at", row.claimed_at)?,
		})
	}
}
