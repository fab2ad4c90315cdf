// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use paygate_core::{Product, ProductCategory};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DbError, Result};
use crate::filter::{paginate, ColumnKind, FilterSchema, ListQuery, Page};
use crate::pool::begin_write;
use crate::{json, time};

pub const PRODUCT_FILTER: FilterSchema = FilterSchema {
	table: "products",
	columns: &[
		("id", ColumnKind::Text),
		("application_id", ColumnKind::Text),
		("category_id", ColumnKind::Text),
		("product_code", ColumnKind::Text),
		("product_name", ColumnKind::Text),
		("description", ColumnKind::Text),
		("price", ColumnKind::Integer),
		("currency", ColumnKind::Text),
		("stock", ColumnKind::Integer),
		("is_active", ColumnKind::Bool),
		("created_at", ColumnKind::Timestamp),
		("updated_at", ColumnKind::Timestamp),
	],
	default_order: "created_at DESC",
};

const PRODUCT_COLUMNS: &str = "id, application_id, category_id, product_code, product_name, description, price, currency, stock, is_active, metadata, created_at, updated_at";

#[derive(Clone)]
pub struct ProductRepository {
	pool: SqlitePool,
}

impl ProductRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, category), fields(category_id = %category.id))]
	pub async fn create_category(&self, category: &ProductCategory) -> Result<()> {
		sqlx::query(
			r#"
            INSERT INTO product_categories (id, category_name, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
		)
		.bind(&category.id)
		.bind(&category.category_name)
		.bind(&category.description)
		.bind(time::encode(category.created_at))
		.bind(time::encode(category.updated_at))
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_category(&self, id: &str) -> Result<Option<ProductCategory>> {
		let row = sqlx::query_as::<_, (String, String, Option<String>, String, String)>(
			"SELECT id, category_name, description, created_at, updated_at FROM product_categories WHERE id = ?",
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(
			|(id, category_name, description, created_at, updated_at)| -> Result<ProductCategory> {
				Ok(ProductCategory {
					id,
					category_name,
					description,
					created_at: time::decode("created_at", &created_at)?,
					updated_at: time::decode("updated_at", &updated_at)?,
				})
			},
		)
		.transpose()
	}

	#[tracing::instrument(skip(self, product), fields(product_id = %product.id, product_code = %product.product_code))]
	pub async fn create(&self, product: &Product) -> Result<()> {
		sqlx::query(
			r#"
            INSERT INTO products (id, application_id, category_id, product_code, product_name, description,
                                  price, currency, stock, is_active, metadata, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
		)
		.bind(&product.id)
		.bind(&product.application_id)
		.bind(&product.category_id)
		.bind(&product.product_code)
		.bind(&product.product_name)
		.bind(&product.description)
		.bind(product.price)
		.bind(&product.currency)
		.bind(product.stock)
		.bind(product.is_active)
		.bind(json::encode_opt(product.metadata.as_ref()))
		.bind(time::encode(product.created_at))
		.bind(time::encode(product.updated_at))
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get(&self, id: &str) -> Result<Option<Product>> {
		let row = sqlx::query_as::<_, ProductRow>(&format!(
			"SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"
		))
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[tracing::instrument(skip(self, query), fields(limit = query.limit, offset = query.offset))]
	pub async fn list(&self, query: &ListQuery) -> Result<Page<Product>> {
		paginate::<ProductRow, Product>(&self.pool, &PRODUCT_FILTER, PRODUCT_COLUMNS, query).await
	}

	/// Take `quantity` units out of stock and return what is left.
	///
	/// # Errors
	/// Returns `DbError::NotFound` for an unknown product and
	/// `DbError::Conflict` if there is not enough stock.
	#[tracing::instrument(skip(self))]
	pub async fn decrement_stock(&self, id: &str, quantity: i64) -> Result<i64> {
		let mut tx = begin_write(&self.pool).await?;
		let remaining = decrement_stock_on(&mut *tx, id, quantity).await?;
		tx.commit().await?;
		Ok(remaining)
	}
}

/// Stock decrement on an open connection so callers can include it in their
/// own database transaction.
pub(crate) async fn decrement_stock_on(
	conn: &mut SqliteConnection,
	id: &str,
	quantity: i64,
) -> Result<i64> {
	if quantity <= 0 {
		return Err(DbError::Conflict(format!(
			"quantity must be positive, got {quantity}"
		)));
	}

	let updated = sqlx::query_as::<_, (i64,)>(
		r#"
        UPDATE products
        SET stock = stock - ?, updated_at = ?
        WHERE id = ? AND stock >= ?
        RETURNING stock
        "#,
	)
	.bind(quantity)
	.bind(time::encode(time::now()))
	.bind(id)
	.bind(quantity)
	.fetch_optional(&mut *conn)
	.await?;

	if let Some((remaining,)) = updated {
		return Ok(remaining);
	}

	let stock = sqlx::query_as::<_, (i64,)>("SELECT stock FROM products WHERE id = ?")
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?;
	match stock {
		Some((available,)) => Err(DbError::Conflict(format!(
			"insufficient stock for product {id}: requested {quantity}, available {available}"
		))),
		None => Err(DbError::NotFound(format!("product {id}"))),
	}
}

#[derive(sqlx::FromRow)]
struct ProductRow {
	id: String,
	application_id: String,
	category_id: Option<String>,
	product_code: String,
	product_name: String,
	description: Option<String>,
	price: i64,
	currency: String,
	stock: i64,
	is_active: bool,
	metadata: Option<String>,
	created_at: String,
	updated_at: String,
}

impl TryFrom<ProductRow> for Product {
	type Error = DbError;

	fn try_from(row: ProductRow) -> Result<Self> {
		Ok(Product {
			id: row.id,
			application_id: row.application_id,
			category_id: row.category_id,
			product_code: row.product_code,
			product_name: row.product_name,
			description: row.description,
			price: row.price,
			currency: row.currency,
			stock: row.stock,
			is_active: row.is_active,
			metadata: json::decode_opt(row.metadata)?,
			created_at: time::decode("created_at", &row.created_at)?,
			updated_at: time::decode("updated_at", &row.updated_at)?,
		})
	}
}
