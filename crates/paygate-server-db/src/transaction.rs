// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Transactions, their line items and the status audit log.
//!
//! Every status change goes through [`TransactionRepository::transition`],
//! which checks the lifecycle and writes a [`TransactionLog`] row in the same
//! database transaction.

use chrono::{DateTime, Utc};
use paygate_core::{
	ChangedBy, Transaction, TransactionItem, TransactionLog, TransactionStatus, Transition,
	VoucherUsage,
};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::{DbError, Result};
use crate::filter::{paginate, ColumnKind, FilterSchema, ListQuery, Page};
use crate::pool::begin_write;
use crate::product::decrement_stock_on;
use crate::voucher::record_usage_on;
use crate::{json, time};

pub const TRANSACTION_FILTER: FilterSchema = FilterSchema {
	table: "transactions",
	columns: &[
		("id", ColumnKind::Text),
		("application_id", ColumnKind::Text),
		("user_id", ColumnKind::Text),
		("transaction_code", ColumnKind::Text),
		("invoice_number", ColumnKind::Text),
		("payment_method_id", ColumnKind::Text),
		("gateway_id", ColumnKind::Text),
		("voucher_id", ColumnKind::Text),
		("status", ColumnKind::Text),
		("subtotal", ColumnKind::Integer),
		("discount_amount", ColumnKind::Integer),
		("admin_fee", ColumnKind::Integer),
		("total_amount", ColumnKind::Integer),
		("currency", ColumnKind::Text),
		("payment_reference", ColumnKind::Text),
		("paid_at", ColumnKind::Timestamp),
		("expired_at", ColumnKind::Timestamp),
		("created_at", ColumnKind::Timestamp),
		("updated_at", ColumnKind::Timestamp),
	],
	default_order: "created_at DESC",
};

const TRANSACTION_COLUMNS: &str = "id, application_id, user_id, transaction_code, invoice_number, payment_method_id, gateway_id, voucher_id, status, subtotal, discount_amount, admin_fee, total_amount, currency, payment_url, payment_token, payment_reference, va_number, qr_code_url, paid_at, expired_at, notes, extra_data, created_at, updated_at";

#[derive(Clone)]
pub struct TransactionRepository {
	pool: SqlitePool,
}

impl TransactionRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Persist a checkout atomically: the transaction, its items, the
	/// initial log entry, stock decrements and the voucher redemption.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if stock runs out or the voucher hits its
	/// usage limit; nothing is written in that case.
	#[tracing::instrument(
		skip(self, transaction, items, voucher_usage),
		fields(transaction_id = %transaction.id, invoice_number = %transaction.invoice_number, items = items.len())
	)]
	pub async fn create(
		&self,
		transaction: &Transaction,
		items: &[TransactionItem],
		voucher_usage: Option<&VoucherUsage>,
	) -> Result<()> {
		let mut tx = begin_write(&self.pool).await?;

		insert_transaction(&mut tx, transaction).await?;
		for item in items {
			insert_item(&mut tx, item).await?;
			decrement_stock_on(&mut tx, &item.product_id, item.quantity).await?;
		}
		insert_log(
			&mut tx,
			&TransactionLog {
				id: Uuid::new_v4().to_string(),
				transaction_id: transaction.id.clone(),
				previous_status: None,
				new_status: transaction.status,
				changed_by: ChangedBy::User,
				gateway_callback_id: None,
				notes: Some("transaction created".to_string()),
				log_metadata: None,
				created_at: transaction.created_at,
			},
		)
		.await?;
		if let Some(usage) = voucher_usage {
			record_usage_on(&mut tx, usage).await?;
		}

		tx.commit().await?;
		tracing::info!(
			transaction_id = %transaction.id,
			total_amount = transaction.total_amount,
			"transaction created"
		);
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get(&self, id: &str) -> Result<Option<Transaction>> {
		fetch_transaction(&self.pool, "id", id).await
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_by_invoice(&self, invoice_number: &str) -> Result<Option<Transaction>> {
		fetch_transaction(&self.pool, "invoice_number", invoice_number).await
	}

	#[tracing::instrument(skip(self, query), fields(limit = query.limit, offset = query.offset))]
	pub async fn list(&self, query: &ListQuery) -> Result<Page<Transaction>> {
		paginate::<TransactionRow, Transaction>(
			&self.pool,
			&TRANSACTION_FILTER,
			TRANSACTION_COLUMNS,
			query,
		)
		.await
	}

	#[tracing::instrument(skip(self))]
	pub async fn items(&self, transaction_id: &str) -> Result<Vec<TransactionItem>> {
		let rows = sqlx::query_as::<_, ItemRow>(
			r#"
            SELECT id, transaction_id, product_id, product_name, product_code, quantity, unit_price,
                   subtotal, item_metadata, created_at
            FROM transaction_items
            WHERE transaction_id = ?
            ORDER BY created_at, id
            "#,
		)
		.bind(transaction_id)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	/// In the order they were written.
	#[tracing::instrument(skip(self))]
	pub async fn logs(&self, transaction_id: &str) -> Result<Vec<TransactionLog>> {
		let rows = sqlx::query_as::<_, LogRow>(
			r#"
            SELECT id, transaction_id, previous_status, new_status, changed_by, gateway_callback_id,
                   notes, log_metadata, created_at
            FROM transaction_logs
            WHERE transaction_id = ?
            ORDER BY rowid
            "#,
		)
		.bind(transaction_id)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	/// Move a transaction to `new_status` and log the change.
	///
	/// Re-applying the current status is a no-op that writes no log.
	///
	/// # Errors
	/// Returns `DbError::NotFound` for an unknown id and `DbError::Domain`
	/// when the lifecycle forbids the change.
	#[tracing::instrument(skip(self, notes))]
	pub async fn transition(
		&self,
		id: &str,
		new_status: TransactionStatus,
		changed_by: ChangedBy,
		callback_id: Option<&str>,
		notes: Option<&str>,
	) -> Result<(Transaction, Transition)> {
		let now = time::now();
		let mut tx = begin_write(&self.pool).await?;

		let mut transaction = fetch_transaction(&mut *tx, "id", id)
			.await?
			.ok_or_else(|| DbError::NotFound(format!("transaction {id}")))?;
		let transition = transaction.apply_status(new_status, now)?;

		if let Transition::Changed { from, to } = transition {
			write_status(&mut tx, &transaction, from).await?;
			insert_log(
				&mut tx,
				&TransactionLog {
					id: Uuid::new_v4().to_string(),
					transaction_id: transaction.id.clone(),
					previous_status: Some(from),
					new_status: to,
					changed_by,
					gateway_callback_id: callback_id.map(str::to_string),
					notes: notes.map(str::to_string),
					log_metadata: None,
					created_at: now,
				},
			)
			.await?;
			tracing::info!(transaction_id = %id, from = %from, to = %to, changed_by = %changed_by, "transaction status changed");
		}

		tx.commit().await?;
		Ok((transaction, transition))
	}

	/// Store the gateway's own reference for a transaction.
	#[tracing::instrument(skip(self))]
	pub async fn set_payment_reference(&self, id: &str, reference: &str) -> Result<()> {
		let result = sqlx::query(
			"UPDATE transactions SET payment_reference = ?, updated_at = ? WHERE id = ?",
		)
		.bind(reference)
		.bind(time::encode(time::now()))
		.bind(id)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("transaction {id}")));
		}
		Ok(())
	}

	/// Expire every open transaction whose payment window closed before `now`.
	/// Returns how many were expired.
	#[tracing::instrument(skip(self))]
	pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64> {
		let mut tx = begin_write(&self.pool).await?;

		let rows = sqlx::query_as::<_, TransactionRow>(&format!(
			r#"
            SELECT {TRANSACTION_COLUMNS} FROM transactions
            WHERE status IN ('pending', 'awaiting_payment')
              AND expired_at IS NOT NULL
              AND expired_at < ?
            "#
		))
		.bind(time::encode(now))
		.fetch_all(&mut *tx)
		.await?;

		let mut expired = 0;
		for row in rows {
			let mut transaction = Transaction::try_from(row)?;
			let Transition::Changed { from, to } =
				transaction.apply_status(TransactionStatus::Expired, now)?
			else {
				continue;
			};
			write_status(&mut tx, &transaction, from).await?;
			insert_log(
				&mut tx,
				&TransactionLog {
					id: Uuid::new_v4().to_string(),
					transaction_id: transaction.id.clone(),
					previous_status: Some(from),
					new_status: to,
					changed_by: ChangedBy::System,
					gateway_callback_id: None,
					notes: Some("payment window elapsed".to_string()),
					log_metadata: None,
					created_at: now,
				},
			)
			.await?;
			expired += 1;
		}

		tx.commit().await?;
		if expired > 0 {
			tracing::info!(expired, "expired overdue transactions");
		}
		Ok(expired)
	}
}

async fn fetch_transaction<'e, E>(executor: E, column: &str, value: &str) -> Result<Option<Transaction>>
where
	E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
	// `column` is one of a fixed set of unique columns chosen by this module.
	let row = sqlx::query_as::<_, TransactionRow>(&format!(
		"SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE {column} = ?"
	))
	.bind(value)
	.fetch_optional(executor)
	.await?;

	row.map(TryInto::try_into).transpose()
}

/// Write the status fields, guarded on the status the change was computed from.
async fn write_status(
	conn: &mut SqliteConnection,
	transaction: &Transaction,
	from: TransactionStatus,
) -> Result<()> {
	let result = sqlx::query(
		"UPDATE transactions SET status = ?, paid_at = ?, updated_at = ? WHERE id = ? AND status = ?",
	)
	.bind(transaction.status.as_str())
	.bind(time::encode_opt(transaction.paid_at))
	.bind(time::encode(transaction.updated_at))
	.bind(&transaction.id)
	.bind(from.as_str())
	.execute(&mut *conn)
	.await?;

	if result.rows_affected() == 0 {
		return Err(DbError::Conflict(format!(
			"transaction {} changed status concurrently",
			transaction.id
		)));
	}
	Ok(())
}

async fn insert_transaction(conn: &mut SqliteConnection, t: &Transaction) -> Result<()> {
	sqlx::query(&format!(
		"INSERT INTO transactions ({TRANSACTION_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
	))
	.bind(&t.id)
	.bind(&t.application_id)
	.bind(&t.user_id)
	.bind(&t.transaction_code)
	.bind(&t.invoice_number)
	.bind(&t.payment_method_id)
	.bind(&t.gateway_id)
	.bind(&t.voucher_id)
	.bind(t.status.as_str())
	.bind(t.subtotal)
	.bind(t.discount_amount)
	.bind(t.admin_fee)
	.bind(t.total_amount)
	.bind(&t.currency)
	.bind(&t.payment_url)
	.bind(&t.payment_token)
	.bind(&t.payment_reference)
	.bind(&t.va_number)
	.bind(&t.qr_code_url)
	.bind(time::encode_opt(t.paid_at))
	.bind(time::encode_opt(t.expired_at))
	.bind(&t.notes)
	.bind(json::encode_opt(t.extra_data.as_ref()))
	.bind(time::encode(t.created_at))
	.bind(time::encode(t.updated_at))
	.execute(&mut *conn)
	.await
	.map_err(|e| {
		DbError::from(e).or_conflict(|| format!("transaction {} already exists", t.invoice_number))
	})?;

	Ok(())
}

async fn insert_item(conn: &mut SqliteConnection, item: &TransactionItem) -> Result<()> {
	sqlx::query(
		r#"
        INSERT INTO transaction_items (id, transaction_id, product_id, product_name, product_code, quantity,
                                       unit_price, subtotal, item_metadata, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
	)
	.bind(&item.id)
	.bind(&item.transaction_id)
	.bind(&item.product_id)
	.bind(&item.product_name)
	.bind(&item.product_code)
	.bind(item.quantity)
	.bind(item.unit_price)
	.bind(item.subtotal)
	.bind(json::encode_opt(item.item_metadata.as_ref()))
	.bind(time::encode(item.created_at))
	.execute(&mut *conn)
	.await?;

	Ok(())
}

async fn insert_log(conn: &mut SqliteConnection, log: &TransactionLog) -> Result<()> {
	sqlx::query(
		r#"
        INSERT INTO transaction_logs (id, transaction_id, previous_status, new_status, changed_by,
                                      gateway_callback_id, notes, log_metadata, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
	)
	.bind(&log.id)
	.bind(&log.transaction_id)
	.bind(log.previous_status.map(|s| s.as_str()))
	.bind(log.new_status.as_str())
	.bind(log.changed_by.as_str())
	.bind(&log.gateway_callback_id)
	.bind(&log.notes)
	.bind(json::encode_opt(log.log_metadata.as_ref()))
	.bind(time::encode(log.created_at))
	.execute(&mut *conn)
	.await?;

	Ok(())
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
	id: String,
	application_id: String,
	user_id: String,
	transaction_code: String,
	invoice_number: String,
	payment_method_id: Option<String>,
	gateway_id: Option<String>,
	voucher_id: Option<String>,
	status: String,
	subtotal: i64,
	discount_amount: i64,
	admin_fee: i64,
	total_amount: i64,
	currency: String,
	payment_url: Option<String>,
	payment_token: Option<String>,
	payment_reference: Option<String>,
	va_number: Option<String>,
	qr_code_url: Option<String>,
	paid_at: Option<String>,
	expired_at: Option<String>,
	notes: Option<String>,
	extra_data: Option<String>,
	created_at: String,
	updated_at: String,
}

impl TryFrom<TransactionRow> for Transaction {
	type Error = DbError;

	fn try_from(row: TransactionRow) -> Result<Self> {
		Ok(Transaction {
			id: row.id,
			application_id: row.application_id,
			user_id: row.user_id,
			transaction_code: row.transaction_code,
			invoice_number: row.invoice_number,
			payment_method_id: row.payment_method_id,
			gateway_id: row.gateway_id,
			voucher_id: row.voucher_id,
			status: row.status.parse()?,
			subtotal: row.subtotal,
			discount_amount: row.discount_amount,
			admin_fee: row.admin_fee,
			total_amount: row.total_amount,
			currency: row.currency,
			payment_url: row.payment_url,
			payment_token: row.payment_token,
			payment_reference: row.payment_reference,
			va_number: row.va_number,
			qr_code_url: row.qr_code_url,
			paid_at: time::decode_opt("paid_at", row.paid_at)?,
			expired_at: time::decode_opt("expired_at", row.expired_at)?,
			notes: row.notes,
			extra_data: json::decode_opt(row.extra_data)?,
			created_at: time::decode("created_at", &row.created_at)?,
			updated_at: time::decode("updated_at", &row.updated_at)?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct ItemRow {
	id: String,
	transaction_id: String,
	product_id: String,
	product_name: String,
	product_code: String,
	quantity: i64,
	unit_price: i64,
	subtotal: i64,
	item_metadata: Option<String>,
	created_at: String,
}

impl TryFrom<ItemRow> for TransactionItem {
	type Error = DbError;

	fn try_from(row: ItemRow) -> Result<Self> {
		Ok(TransactionItem {
			id: row.id,
			transaction_id: row.transaction_id,
			product_id: row.product_id,
			product_name: row.product_name,
			product_code: row.product_code,
			quantity: row.quantity,
			unit_price: row.unit_price,
			subtotal: row.subtotal,
			item_metadata: json::decode_opt(row.item_metadata)?,
			created_at: time::decode("created_at", &row.created_at)?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct LogRow {
	id: String,
	transaction_id: String,
	previous_status: Option<String>,
	new_status: String,
	changed_by: String,
	gateway_callback_id: Option<String>,
	notes: Option<String>,
	log_metadata: Option<String>,
	created_at: String,
}

impl TryFrom<LogRow> for TransactionLog {
	type Error = DbError;

	fn try_from(row: LogRow) -> Result<Self> {
		Ok(TransactionLog {
			id: row.id,
			transaction_id: row.transaction_id,
			previous_status: row.previous_status.map(|s| s.parse()).transpose()?,
			new_status: row.new_status.parse()?,
			changed_by: row.changed_by.parse()?,
			gateway_callback_id: row.gateway_callback_id,
			notes: row.notes,
			log_metadata: json::decode_opt(row.log_metadata)?,
			created_at: time::decode("created_at", &row.created_at)?,
		})
	}
}
