// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Voucher evaluation against stored conditions, usage and eligibility.

use chrono::{DateTime, Utc};
use paygate_core::{Voucher, VoucherContext, VoucherRejection};
use tracing::instrument;

use crate::api::Repositories;
use crate::error::Result;

/// Checkout facts a voucher is judged against.
#[derive(Debug, Clone, Default)]
pub struct VoucherCheck {
	pub user_id: String,
	pub subtotal: i64,
	pub product_ids: Vec<String>,
	pub category_ids: Vec<String>,
	pub payment_method_code: Option<String>,
	pub user_segments: Vec<String>,
}

/// The outer `Result` carries storage failures, the inner one the verdict.
#[instrument(skip(repos, voucher, check), fields(voucher_id = %voucher.id, user_id = %check.user_id, subtotal = check.subtotal))]
pub async fn evaluate(
	repos: &Repositories,
	voucher: &Voucher,
	check: VoucherCheck,
	now: DateTime<Utc>,
) -> Result<std::result::Result<i64, VoucherRejection>> {
	let conditions = repos.vouchers.list_conditions(&voucher.id).await?;
	let user_usage_count = repos
		.vouchers
		.count_user_usage(&voucher.id, &check.user_id)
		.await?;
	let eligibility = if voucher.requires_eligibility() {
		repos
			.vouchers
			.get_eligibility(&voucher.id, &check.user_id)
			.await?
	} else {
		None
	};

	let mut ctx = VoucherContext::new(check.user_id, check.subtotal, now);
	ctx.product_ids = check.product_ids;
	ctx.category_ids = check.category_ids;
	ctx.payment_method_code = check.payment_method_code;
	ctx.user_segments = check.user_segments;
	ctx.user_usage_count = user_usage_count;
	ctx.eligibility = eligibility;

	let verdict = voucher.evaluate(&conditions, &ctx);
	if let Err(rejection) = &verdict {
		tracing::debug!(reason = rejection.code(), "voucher rejected");
	}
	Ok(verdict)
}

/// Distinct categories of the given products. Unknown products are skipped.
pub async fn categories_of(repos: &Repositories, product_ids: &[String]) -> Result<Vec<String>> {
	let mut categories = Vec::new();
	for id in product_ids {
		if let Some(category) = repos.products.get(id).await?.and_then(|p| p.category_id) {
			if !categories.contains(&category) {
				categories.push(category);
			}
		}
	}
	Ok(categories)
}

#[cfg(test)]
mod tests {
	use super::*;
	use paygate_core::VoucherType;
	use paygate_server_db::{testing, time};

	async fn setup() -> (Repositories, testing::CheckoutFixture) {
		let pool = testing::create_test_pool().await;
		let fixture = testing::seed_checkout(&pool).await;
		(Repositories::new(pool), fixture)
	}

	fn check(user_id: &str, subtotal: i64) -> VoucherCheck {
		VoucherCheck {
			user_id: user_id.to_string(),
			subtotal,
			..Default::default()
		}
	}

	#[tokio::test]
	async fn test_public_voucher_discount() {
		let (repos, f) = setup().await;
		let voucher = testing::voucher(&f.application.id, "SAVE10");
		repos.vouchers.create(&voucher).await.unwrap();

		let verdict = evaluate(&repos, &voucher, check("user-1", 100_000), time::now())
			.await
			.unwrap();
		assert_eq!(verdict, Ok(10_000));
	}

	#[tokio::test]
	async fn test_private_voucher_needs_grant() {
		let (repos, f) = setup().await;
		let mut voucher = testing::voucher(&f.application.id, "VIP");
		voucher.voucher_type = VoucherType::Private;
		repos.vouchers.create(&voucher).await.unwrap();
		let now = time::now();

		let verdict = evaluate(&repos, &voucher, check("user-1", 100_000), now)
			.await
			.unwrap();
		assert_eq!(verdict, Err(VoucherRejection::NotEligible));

		repos
			.vouchers
			.add_eligible_users(&voucher.id, &f.application.id, &["user-1".to_string()], None, now)
			.await
			.unwrap();
		let verdict = evaluate(&repos, &voucher, check("user-1", 100_000), now)
			.await
			.unwrap();
		assert_eq!(verdict, Ok(10_000));
	}

	#[tokio::test]
	async fn test_categories_of_skips_unknown_products() {
		let (repos, f) = setup().await;
		let games = testing::category("games");
		repos.products.create_category(&games).await.unwrap();
		let mut first = testing::product(&f.application.id, "GEMS-500", 60_000, 10);
		first.category_id = Some(games.id.clone());
		let mut second = testing::product(&f.application.id, "GEMS-900", 95_000, 10);
		second.category_id = Some(games.id.clone());
		repos.products.create(&first).await.unwrap();
		repos.products.create(&second).await.unwrap();

		let categories = categories_of(
			&repos,
			&[
				first.id.clone(),
				f.product.id.clone(),
				second.id.clone(),
				"missing".to_string(),
			],
		)
		.await
		.unwrap();
		assert_eq!(categories, vec![games.id]);
	}
}
