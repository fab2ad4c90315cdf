// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Criteria filtering, sorting and pagination for list endpoints.
//!
//! Clients describe filters either as JSON or in a compact legacy string form:
//!
//! ```text
//! ["status", "paid"]                            field = value
//! ["total_amount", ">=", 10000]                 field op value
//! {"field": "currency", "operator": "in", "value": ["IDR", "USD"]}
//! {"and": [...]} / {"or": [...]}
//! and(status:paid,currency:idr)                 legacy, implicit "and" without wrapper
//! ```
//!
//! Fields are checked against a per-table [`FilterSchema`] and every value is a
//! bound parameter.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use crate::error::DbError;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
	#[error("'{field}' is not a valid field on '{table}'")]
	UnknownField { table: &'static str, field: String },

	#[error("unsupported operator: {0}")]
	UnknownOperator(String),

	#[error("invalid sort order '{0}'")]
	InvalidSortDirection(String),

	#[error("invalid sortby format: '{0}'")]
	InvalidSort(String),

	#[error("invalid condition: {0}")]
	InvalidCondition(String),

	#[error("invalid value '{value}' for field '{field}'")]
	InvalidValue { field: String, value: String },

	#[error("'{0}' operator requires a list/array value")]
	ExpectedList(&'static str),

	#[error("invalid criteria format: {0}")]
	Malformed(String),
}

/// Storage class of a filterable column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
	Text,
	Integer,
	Real,
	Bool,
	Timestamp,
}

/// Whitelist of filterable and sortable columns for one table.
#[derive(Debug, Clone, Copy)]
pub struct FilterSchema {
	pub table: &'static str,
	pub columns: &'static [(&'static str, ColumnKind)],
	/// `ORDER BY` clause used when the client gives no sort.
	pub default_order: &'static str,
}

impl FilterSchema {
	pub fn column(&self, field: &str) -> Result<ColumnKind, FilterError> {
		self.columns
			.iter()
			.find(|(name, _)| *name == field)
			.map(|(_, kind)| *kind)
			.ok_or_else(|| FilterError::UnknownField {
				table: self.table,
				field: field.to_string(),
			})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
	Eq,
	Ne,
	Gt,
	Gte,
	Lt,
	Lte,
	Like,
	ILike,
	NotLike,
	NotILike,
	In,
	NotIn,
	IsNull,
	IsNotNull,
}

impl FromStr for Operator {
	type Err = FilterError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s.trim().to_ascii_lowercase().as_str() {
			"=" | "==" | "eq" => Operator::Eq,
			"!=" | "<>" | "ne" => Operator::Ne,
			">" | "gt" => Operator::Gt,
			">=" | "gte" => Operator::Gte,
			"<" | "lt" => Operator::Lt,
			"<=" | "lte" => Operator::Lte,
			"like" => Operator::Like,
			"ilike" => Operator::ILike,
			"not_like" => Operator::NotLike,
			"not_ilike" => Operator::NotILike,
			"in" => Operator::In,
			"not_in" => Operator::NotIn,
			"is_null" => Operator::IsNull,
			"is_not_null" => Operator::IsNotNull,
			_ => return Err(FilterError::UnknownOperator(s.to_string())),
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
	Condition {
		field: String,
		op: Operator,
		value: Value,
	},
	And(Vec<Criteria>),
	Or(Vec<Criteria>),
}

impl Criteria {
	pub fn condition(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
		Criteria::Condition {
			field: field.into(),
			op,
			value: value.into(),
		}
	}

	/// Parse a `criteria` query parameter. JSON is tried when the text looks
	/// like an array or object, the legacy string form otherwise.
	pub fn parse(raw: &str, schema: &FilterSchema) -> Result<Self, FilterError> {
		let raw = raw.trim();
		if raw.starts_with('[') || raw.starts_with('{') {
			let value: Value =
				serde_json::from_str(raw).map_err(|e| FilterError::Malformed(e.to_string()))?;
			Self::from_json(&value, schema)
		} else {
			Self::parse_legacy(raw, schema)
		}
	}

	pub fn from_json(value: &Value, schema: &FilterSchema) -> Result<Self, FilterError> {
		match value {
			Value::String(s) => Self::parse_legacy(s, schema),
			Value::Array(_) => Self::condition_from_json(value),
			Value::Object(map) => {
				if let Some(items) = map.get("and") {
					Ok(Criteria::And(Self::group(items, schema)?))
				} else if let Some(items) = map.get("or") {
					Ok(Criteria::Or(Self::group(items, schema)?))
				} else {
					Self::condition_from_json(value)
				}
			}
			_ => Err(FilterError::Malformed(value.to_string())),
		}
	}

	fn group(items: &Value, schema: &FilterSchema) -> Result<Vec<Criteria>, FilterError> {
		items
			.as_array()
			.ok_or_else(|| FilterError::Malformed("'and'/'or' expects an array".to_string()))?
			.iter()
			.map(|item| Self::from_json(item, schema))
			.collect()
	}

	fn condition_from_json(value: &Value) -> Result<Self, FilterError> {
		let (field, op, value) = match value {
			Value::Object(map) => {
				let field = map.get("field").and_then(Value::as_str).ok_or_else(|| {
					FilterError::InvalidCondition("dict condition must have 'field' key".to_string())
				})?;
				let op = match map.get("operator") {
					Some(Value::String(op)) => op.parse()?,
					Some(other) => return Err(FilterError::UnknownOperator(other.to_string())),
					None => Operator::Eq,
				};
				(field, op, map.get("value").cloned().unwrap_or(Value::Null))
			}
			Value::Array(items) => match items.as_slice() {
				[Value::String(field), value] => (field.as_str(), Operator::Eq, value.clone()),
				[Value::String(field), Value::String(op), value] => {
					(field.as_str(), op.parse()?, value.clone())
				}
				[_, Value::String(_), _] | [_, _] => {
					return Err(FilterError::InvalidCondition(
						"field name must be a string".to_string(),
					))
				}
				_ => {
					return Err(FilterError::InvalidCondition(
						"array condition must have 2 or 3 elements: [field, value] or [field, operator, value]"
							.to_string(),
					))
				}
			},
			_ => {
				return Err(FilterError::InvalidCondition(
					"condition must be either dict or array format".to_string(),
				))
			}
		};
		Ok(Criteria::condition(field, op, value))
	}

	/// Parse `and(f:v,...)`, `or(f:v,...)` or bare `f:v,...`.
	pub fn parse_legacy(raw: &str, schema: &FilterSchema) -> Result<Self, FilterError> {
		let raw = raw.trim();
		let (body, or) = if let Some(inner) = raw.strip_prefix("and(").and_then(|r| r.strip_suffix(')')) {
			(inner, false)
		} else if let Some(inner) = raw.strip_prefix("or(").and_then(|r| r.strip_suffix(')')) {
			(inner, true)
		} else {
			(raw, false)
		};

		let conditions = body
			.split(',')
			.map(|part| Self::legacy_condition(part.trim(), schema))
			.collect::<Result<Vec<_>, _>>()?;

		Ok(if or {
			Criteria::Or(conditions)
		} else {
			Criteria::And(conditions)
		})
	}

	fn legacy_condition(part: &str, schema: &FilterSchema) -> Result<Self, FilterError> {
		let (field, raw_value) = part
			.split_once(':')
			.ok_or_else(|| FilterError::Malformed(format!("invalid format: '{part}'")))?;
		let invalid = || FilterError::InvalidValue {
			field: field.to_string(),
			value: raw_value.to_string(),
		};

		Ok(match schema.column(field)? {
			ColumnKind::Text => Criteria::condition(field, Operator::ILike, raw_value),
			ColumnKind::Bool => Criteria::condition(field, Operator::Eq, truthy(raw_value)),
			ColumnKind::Integer => Criteria::condition(
				field,
				Operator::Eq,
				raw_value.trim().parse::<i64>().map_err(|_| invalid())?,
			),
			ColumnKind::Real => Criteria::condition(
				field,
				Operator::Eq,
				raw_value.trim().parse::<f64>().map_err(|_| invalid())?,
			),
			ColumnKind::Timestamp => Criteria::condition(field, Operator::Eq, raw_value),
		})
	}

	/// Append this filter as SQL to `qb`.
	pub fn push_sql(
		&self,
		qb: &mut QueryBuilder<'_, Sqlite>,
		schema: &FilterSchema,
	) -> Result<(), FilterError> {
		match self {
			Criteria::And(items) => push_group(qb, schema, items, " AND ", "1 = 1"),
			Criteria::Or(items) => push_group(qb, schema, items, " OR ", "1 = 0"),
			Criteria::Condition { field, op, value } => {
				let kind = schema.column(field)?;
				push_condition(qb, field, kind, *op, value)
			}
		}
	}
}

fn truthy(raw: &str) -> bool {
	matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

fn push_group(
	qb: &mut QueryBuilder<'_, Sqlite>,
	schema: &FilterSchema,
	items: &[Criteria],
	joiner: &str,
	empty: &str,
) -> Result<(), FilterError> {
	if items.is_empty() {
		qb.push(empty);
		return Ok(());
	}
	qb.push("(");
	for (i, item) in items.iter().enumerate() {
		if i > 0 {
			qb.push(joiner);
		}
		item.push_sql(qb, schema)?;
	}
	qb.push(")");
	Ok(())
}

/// A value coerced to its column's storage class.
#[derive(Debug, Clone, PartialEq)]
enum Bound {
	Null,
	Bool(bool),
	Int(i64),
	Real(f64),
	Text(String),
}

fn text_of(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

fn coerce(field: &str, kind: ColumnKind, value: &Value) -> Result<Bound, FilterError> {
	let invalid = || FilterError::InvalidValue {
		field: field.to_string(),
		value: text_of(value),
	};

	if value.is_null() {
		return Ok(Bound::Null);
	}

	Ok(match kind {
		ColumnKind::Bool => match value {
			Value::Bool(b) => Bound::Bool(*b),
			Value::String(s) => Bound::Bool(truthy(s)),
			Value::Number(n) => Bound::Bool(n.as_f64().is_some_and(|f| f != 0.0)),
			_ => return Err(invalid()),
		},
		ColumnKind::Integer => match value {
			Value::Number(n) => match n.as_i64() {
				Some(i) => Bound::Int(i),
				None => Bound::Real(n.as_f64().ok_or_else(invalid)?),
			},
			Value::String(s) => match s.trim().parse::<i64>() {
				Ok(i) => Bound::Int(i),
				Err(_) => Bound::Real(s.trim().parse::<f64>().map_err(|_| invalid())?),
			},
			Value::Bool(b) => Bound::Int(i64::from(*b)),
			_ => return Err(invalid()),
		},
		ColumnKind::Real => match value {
			Value::Number(n) => Bound::Real(n.as_f64().ok_or_else(invalid)?),
			Value::String(s) => Bound::Real(s.trim().parse::<f64>().map_err(|_| invalid())?),
			_ => return Err(invalid()),
		},
		ColumnKind::Timestamp => match value {
			Value::String(s) => match crate::time::decode(field, s.trim()) {
				Ok(ts) => Bound::Text(crate::time::encode(ts)),
				Err(_) => Bound::Text(s.clone()),
			},
			_ => return Err(invalid()),
		},
		ColumnKind::Text => Bound::Text(text_of(value)),
	})
}

fn push_bound(qb: &mut QueryBuilder<'_, Sqlite>, bound: Bound) {
	match bound {
		Bound::Null => qb.push_bind(Option::<String>::None),
		Bound::Bool(b) => qb.push_bind(b),
		Bound::Int(i) => qb.push_bind(i),
		Bound::Real(f) => qb.push_bind(f),
		Bound::Text(s) => qb.push_bind(s),
	};
}

fn push_condition(
	qb: &mut QueryBuilder<'_, Sqlite>,
	field: &str,
	kind: ColumnKind,
	op: Operator,
	value: &Value,
) -> Result<(), FilterError> {
	// `field` has been checked against the schema whitelist.
	match op {
		Operator::IsNull => {
			qb.push(field).push(" IS NULL");
		}
		Operator::IsNotNull => {
			qb.push(field).push(" IS NOT NULL");
		}
		Operator::In | Operator::NotIn => {
			let name = if op == Operator::In { "in" } else { "not_in" };
			let items = value.as_array().ok_or(FilterError::ExpectedList(name))?;
			if items.is_empty() {
				qb.push(if op == Operator::In { "1 = 0" } else { "1 = 1" });
				return Ok(());
			}
			let bound = items
				.iter()
				.map(|item| coerce(field, kind, item))
				.collect::<Result<Vec<_>, _>>()?;
			qb.push(field)
				.push(if op == Operator::In { " IN (" } else { " NOT IN (" });
			let mut separated = qb.separated(", ");
			for b in bound {
				match b {
					Bound::Null => separated.push_bind(Option::<String>::None),
					Bound::Bool(v) => separated.push_bind(v),
					Bound::Int(v) => separated.push_bind(v),
					Bound::Real(v) => separated.push_bind(v),
					Bound::Text(v) => separated.push_bind(v),
				};
			}
			separated.push_unseparated(")");
		}
		Operator::Like | Operator::NotLike => {
			qb.push(field).push(if op == Operator::Like {
				" LIKE "
			} else {
				" NOT LIKE "
			});
			qb.push_bind(format!("%{}%", text_of(value)));
		}
		Operator::ILike | Operator::NotILike => {
			qb.push("LOWER(").push(field).push(if op == Operator::ILike {
				") LIKE "
			} else {
				") NOT LIKE "
			});
			qb.push_bind(format!("%{}%", text_of(value).to_lowercase()));
		}
		Operator::Eq | Operator::Ne => {
			let bound = coerce(field, kind, value)?;
			match (op, bound) {
				(Operator::Eq, Bound::Null) => {
					qb.push(field).push(" IS NULL");
				}
				(_, Bound::Null) => {
					qb.push(field).push(" IS NOT NULL");
				}
				(op, bound) => {
					qb.push(field)
						.push(if op == Operator::Eq { " = " } else { " != " });
					push_bound(qb, bound);
				}
			}
		}
		Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
			let sql = match op {
				Operator::Gt => " > ",
				Operator::Gte => " >= ",
				Operator::Lt => " < ",
				_ => " <= ",
			};
			qb.push(field).push(sql);
			push_bound(qb, coerce(field, kind, value)?);
		}
	}
	Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
	Asc,
	Desc,
}

impl FromStr for SortDirection {
	type Err = FilterError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim() {
			"asc" => Ok(SortDirection::Asc),
			"desc" => Ok(SortDirection::Desc),
			other => Err(FilterError::InvalidSortDirection(other.to_string())),
		}
	}
}

impl fmt::Display for SortDirection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			SortDirection::Asc => "ASC",
			SortDirection::Desc => "DESC",
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
	pub field: String,
	pub direction: SortDirection,
}

/// Parse a `sortby` parameter: `"field:asc,field2:desc"` or
/// `[["field", "asc"], ...]`.
pub fn parse_sort(raw: &str) -> Result<Vec<SortKey>, FilterError> {
	let raw = raw.trim();
	if raw.is_empty() {
		return Ok(Vec::new());
	}

	if raw.starts_with('[') {
		let items: Vec<Vec<String>> =
			serde_json::from_str(raw).map_err(|_| FilterError::InvalidSort(raw.to_string()))?;
		return items
			.into_iter()
			.map(|item| match item.as_slice() {
				[field, direction] => Ok(SortKey {
					field: field.clone(),
					direction: direction.parse()?,
				}),
				_ => Err(FilterError::InvalidSort(
					"sort item must have exactly 2 elements: [field, direction]".to_string(),
				)),
			})
			.collect();
	}

	raw.split(',')
		.map(|param| {
			let (field, direction) = param
				.split_once(':')
				.ok_or_else(|| FilterError::InvalidSort(param.to_string()))?;
			Ok(SortKey {
				field: field.trim().to_string(),
				direction: direction.parse()?,
			})
		})
		.collect()
}

/// Filter, sort and window for one list request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
	pub criteria: Option<Criteria>,
	pub sort: Vec<SortKey>,
	pub limit: i64,
	pub offset: i64,
}

impl Default for ListQuery {
	fn default() -> Self {
		Self {
			criteria: None,
			sort: Vec::new(),
			limit: DEFAULT_LIMIT,
			offset: 0,
		}
	}
}

impl ListQuery {
	/// Build from raw query-string values.
	pub fn from_params(
		criteria: Option<&str>,
		sortby: Option<&str>,
		limit: i64,
		offset: i64,
		schema: &FilterSchema,
	) -> Result<Self, FilterError> {
		let criteria = criteria
			.map(str::trim)
			.filter(|c| !c.is_empty())
			.map(|c| Criteria::parse(c, schema))
			.transpose()?;
		let sort = sortby.map(parse_sort).transpose()?.unwrap_or_default();
		Ok(Self {
			criteria,
			sort,
			limit,
			offset,
		})
	}

	/// Add a condition that must hold in addition to the client's criteria.
	pub fn and(mut self, extra: Criteria) -> Self {
		self.criteria = Some(match self.criteria.take() {
			Some(Criteria::And(mut items)) => {
				items.push(extra);
				Criteria::And(items)
			}
			Some(existing) => Criteria::And(vec![existing, extra]),
			None => extra,
		});
		self
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PageMeta {
	pub total: i64,
	pub per_page: i64,
	pub current_page: i64,
	pub total_pages: i64,
}

impl PageMeta {
	pub fn new(total: i64, limit: i64, offset: i64) -> Self {
		if limit <= 0 {
			return Self {
				total,
				per_page: limit,
				current_page: 1,
				total_pages: 1,
			};
		}
		Self {
			total,
			per_page: limit,
			current_page: offset / limit + 1,
			total_pages: (total + limit - 1) / limit,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Page<T> {
	pub data: Vec<T>,
	pub metas: PageMeta,
}

impl<T> Page<T> {
	pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
		Page {
			data: self.data.into_iter().map(f).collect(),
			metas: self.metas,
		}
	}
}

fn push_where(
	qb: &mut QueryBuilder<'_, Sqlite>,
	schema: &FilterSchema,
	criteria: Option<&Criteria>,
) -> Result<(), FilterError> {
	if let Some(criteria) = criteria {
		qb.push(" WHERE ");
		criteria.push_sql(qb, schema)?;
	}
	Ok(())
}

fn push_order(
	qb: &mut QueryBuilder<'_, Sqlite>,
	schema: &FilterSchema,
	sort: &[SortKey],
) -> Result<(), FilterError> {
	qb.push(" ORDER BY ");
	if sort.is_empty() {
		qb.push(schema.default_order);
		return Ok(());
	}
	for (i, key) in sort.iter().enumerate() {
		schema.column(&key.field)?;
		if i > 0 {
			qb.push(", ");
		}
		qb.push(&key.field).push(" ").push(key.direction.to_string());
	}
	Ok(())
}

/// Run a filtered, sorted, paginated `SELECT` against `schema.table`.
///
/// `R` is the row type and `T` the domain type it converts into.
pub async fn paginate<R, T>(
	pool: &SqlitePool,
	schema: &FilterSchema,
	columns: &str,
	query: &ListQuery,
) -> Result<Page<T>, DbError>
where
	R: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
	T: TryFrom<R, Error = DbError>,
{
	let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM ");
	count_qb.push(schema.table);
	push_where(&mut count_qb, schema, query.criteria.as_ref())?;
	let (total,) = count_qb
		.build_query_as::<(i64,)>()
		.fetch_one(pool)
		.await?;

	let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
	qb.push(columns).push(" FROM ").push(schema.table);
	push_where(&mut qb, schema, query.criteria.as_ref())?;
	push_order(&mut qb, schema, &query.sort)?;
	qb.push(" LIMIT ")
		.push_bind(query.limit)
		.push(" OFFSET ")
		.push_bind(query.offset);

	let rows = qb.build_query_as::<R>().fetch_all(pool).await?;
	let data = rows
		.into_iter()
		.map(T::try_from)
		.collect::<Result<Vec<_>, _>>()?;

	tracing::debug!(table = schema.table, total, returned = data.len(), "paginated query");

	Ok(Page {
		data,
		metas: PageMeta::new(total, query.limit, query.offset),
	})
}
