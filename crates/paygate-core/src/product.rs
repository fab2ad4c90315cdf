// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProductCategory {
	pub id: String,
	pub category_name: String,
	pub description: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// A sellable item. `price` is in minor units of `currency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Product {
	pub id: String,
	pub application_id: String,
	pub category_id: Option<String>,
	pub product_code: String,
	pub product_name: String,
	pub description: Option<String>,
	pub price: i64,
	pub currency: String,
	pub stock: i64,
	pub is_active: bool,
	#[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
	pub metadata: Option<serde_json::Value>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Product {
	pub fn is_purchasable(&self, quantity: i64) -> bool {
		self.is_active && quantity > 0 && self.stock >= quantity
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn product(stock: i64, is_active: bool) -> Product {
		let now = Utc::now();
		Product {
			id: "p1".to_string(),
			application_id: "app".to_string(),
			category_id: None,
			product_code: "SKU-1".to_string(),
			product_name: "Premium Plan".to_string(),
			description: None,
			price: 150_000,
			currency: "IDR".to_string(),
			stock,
			is_active,
			metadata: None,
			created_at: now,
			updated_at: now,
		}
	}

	#[test]
	fn test_purchasable_requires_stock_and_active() {
		assert!(product(5, true).is_purchasable(5));
		assert!(!product(4, true).is_purchasable(5));
		assert!(!product(5, false).is_purchasable(1));
		assert!(!product(5, true).is_purchasable(0));
	}
}
