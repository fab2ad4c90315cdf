// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Vouchers and the rules that decide whether one applies to a checkout.
//!
//! [`Voucher::evaluate`] runs the checks in a fixed order and stops at the
//! first failure, so a caller always sees the most fundamental reason a
//! voucher was refused (an expired voucher reports `Expired`, never a failed
//! condition).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::enums::{ConditionType, DiscountType, OperatorType, VoucherType};
use crate::error::VoucherRejection;
use crate::fee::percent_of;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Voucher {
	pub id: String,
	pub application_id: String,
	pub voucher_code: String,
	pub voucher_name: String,
	pub description: Option<String>,
	pub voucher_type: VoucherType,
	pub discount_type: DiscountType,
	/// Minor units for fixed discounts, percent for percentage discounts.
	pub discount_value: f64,
	pub max_discount: Option<i64>,
	pub min_transaction: i64,
	pub usage_limit: Option<i64>,
	pub usage_count: i64,
	pub usage_limit_per_user: Option<i64>,
	pub valid_from: Option<DateTime<Utc>>,
	pub valid_until: Option<DateTime<Utc>>,
	pub is_active: bool,
	pub is_auto_apply: bool,
	#[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
	pub applicable_products: Option<Value>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VoucherCondition {
	pub id: String,
	pub voucher_id: String,
	pub condition_type: ConditionType,
	pub operator: OperatorType,
	#[cfg_attr(feature = "openapi", schema(value_type = Object))]
	pub condition_value: Value,
	pub is_required: bool,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VoucherEligibleUser {
	pub id: String,
	pub voucher_id: String,
	pub user_id: String,
	pub application_id: String,
	pub eligible_at: DateTime<Utc>,
	pub notified_at: Option<DateTime<Utc>>,
	pub expires_at: Option<DateTime<Utc>>,
	pub is_claimed: bool,
	pub claimed_at: Option<DateTime<Utc>>,
}

impl VoucherEligibleUser {
	pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
		self.expires_at.is_some_and(|at| at <= now)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VoucherUsage {
	pub id: String,
	pub voucher_id: String,
	pub user_id: String,
	pub application_id: String,
	pub transaction_id: String,
	pub used_at: DateTime<Utc>,
}

/// Everything the evaluator needs to know about the checkout.
#[derive(Debug, Clone)]
pub struct VoucherContext {
	pub user_id: String,
	pub subtotal: i64,
	pub product_ids: Vec<String>,
	pub category_ids: Vec<String>,
	pub payment_method_code: Option<String>,
	pub user_segments: Vec<String>,
	pub now: DateTime<Utc>,
	/// Times this user already redeemed the voucher.
	pub user_usage_count: i64,
	pub eligibility: Option<VoucherEligibleUser>,
}

impl VoucherContext {
	pub fn new(user_id: impl Into<String>, subtotal: i64, now: DateTime<Utc>) -> Self {
		Self {
			user_id: user_id.into(),
			subtotal,
			product_ids: Vec::new(),
			category_ids: Vec::new(),
			payment_method_code: None,
			user_segments: Vec::new(),
			now,
			user_usage_count: 0,
			eligibility: None,
		}
	}
}

impl Voucher {
	/// Check the voucher against a checkout and return the discount in minor units.
	pub fn evaluate(
		&self,
		conditions: &[VoucherCondition],
		ctx: &VoucherContext,
	) -> Result<i64, VoucherRejection> {
		if !self.is_active {
			return Err(VoucherRejection::Inactive);
		}
		if self.valid_from.is_some_and(|from| ctx.now < from) {
			return Err(VoucherRejection::NotYetValid);
		}
		if self.valid_until.is_some_and(|until| ctx.now > until) {
			return Err(VoucherRejection::Expired);
		}
		if self.usage_limit.is_some_and(|limit| self.usage_count >= limit) {
			return Err(VoucherRejection::UsageLimitReached);
		}
		if self
			.usage_limit_per_user
			.is_some_and(|limit| ctx.user_usage_count >= limit)
		{
			return Err(VoucherRejection::UserLimitReached);
		}
		if ctx.subtotal < self.min_transaction {
			return Err(VoucherRejection::MinimumNotMet {
				required: self.min_transaction,
			});
		}
		if self.requires_eligibility() {
			match &ctx.eligibility {
				Some(e) if e.user_id == ctx.user_id && !e.is_expired(ctx.now) => {}
				_ => return Err(VoucherRejection::NotEligible),
			}
		}

		check_conditions(conditions, ctx)?;

		Ok(self.discount_for(ctx.subtotal))
	}

	pub fn requires_eligibility(&self) -> bool {
		matches!(self.voucher_type, VoucherType::Private | VoucherType::Referral)
	}

	/// Discount for a subtotal, always within `0..=subtotal`.
	pub fn discount_for(&self, subtotal: i64) -> i64 {
		if subtotal <= 0 || !self.discount_value.is_finite() || self.discount_value <= 0.0 {
			return 0;
		}
		let discount = match self.discount_type {
			DiscountType::Fixed => self.discount_value.round() as i64,
			DiscountType::Percentage => {
				let raw = percent_of(subtotal, self.discount_value);
				match self.max_discount {
					Some(cap) => raw.min(cap.max(0)),
					None => raw,
				}
			}
		};
		discount.clamp(0, subtotal)
	}
}

fn check_conditions(
	conditions: &[VoucherCondition],
	ctx: &VoucherContext,
) -> Result<(), VoucherRejection> {
	for condition in conditions.iter().filter(|c| c.is_required) {
		if !condition_holds(condition, ctx)? {
			return Err(VoucherRejection::ConditionFailed {
				condition_type: condition.condition_type,
			});
		}
	}

	let optional: Vec<&VoucherCondition> = conditions.iter().filter(|c| !c.is_required).collect();
	if let Some(first) = optional.first() {
		let mut any_passed = false;
		for condition in &optional {
			if condition_holds(condition, ctx)? {
				any_passed = true;
				break;
			}
		}
		if !any_passed {
			return Err(VoucherRejection::ConditionFailed {
				condition_type: first.condition_type,
			});
		}
	}

	Ok(())
}

enum Subject<'a> {
	Number(f64),
	Text(Option<&'a str>),
	Set(&'a [String]),
}

fn subject<'a>(condition_type: ConditionType, ctx: &'a VoucherContext) -> Subject<'a> {
	match condition_type {
		ConditionType::MinAmount | ConditionType::MaxAmount => Subject::Number(ctx.subtotal as f64),
		ConditionType::PaymentMethod => Subject::Text(ctx.payment_method_code.as_deref()),
		ConditionType::ProductId => Subject::Set(&ctx.product_ids),
		ConditionType::CategoryId => Subject::Set(&ctx.category_ids),
		ConditionType::UserSegment => Subject::Set(&ctx.user_segments),
	}
}

/// Condition values are stored either bare or wrapped as `{"value": ...}`.
fn unwrap_value(value: &Value) -> &Value {
	match value {
		Value::Object(map) => map.get("value").unwrap_or(value),
		other => other,
	}
}

fn as_key(value: &Value) -> Option<String> {
	match value {
		Value::String(s) => Some(s.clone()),
		Value::Number(n) => Some(n.to_string()),
		Value::Bool(b) => Some(b.to_string()),
		_ => None,
	}
}

fn as_number(value: &Value) -> Option<f64> {
	match value {
		Value::Number(n) => n.as_f64(),
		Value::String(s) => s.trim().parse().ok(),
		_ => None,
	}
}

fn condition_holds(
	condition: &VoucherCondition,
	ctx: &VoucherContext,
) -> Result<bool, VoucherRejection> {
	let value = unwrap_value(&condition.condition_value);
	let invalid = |message: &str| VoucherRejection::InvalidCondition {
		condition_type: condition.condition_type,
		message: message.to_string(),
	};
	let list = || -> Result<Vec<String>, VoucherRejection> {
		match value {
			Value::Array(items) => Ok(items.iter().filter_map(as_key).collect()),
			_ => Err(invalid("operator requires an array value")),
		}
	};

	match subject(condition.condition_type, ctx) {
		Subject::Number(n) => match condition.operator {
			OperatorType::Equal | OperatorType::NotEqual => {
				let target = as_number(value).ok_or_else(|| invalid("expected a number"))?;
				let equal = (n - target).abs() < f64::EPSILON;
				Ok(equal == (condition.operator == OperatorType::Equal))
			}
			OperatorType::GreaterThan => {
				let target = as_number(value).ok_or_else(|| invalid("expected a number"))?;
				Ok(n > target)
			}
			OperatorType::LessThan => {
				let target = as_number(value).ok_or_else(|| invalid("expected a number"))?;
				Ok(n < target)
			}
			OperatorType::In | OperatorType::NotIn => {
				let Value::Array(items) = value else {
					return Err(invalid("operator requires an array value"));
				};
				let found = items
					.iter()
					.filter_map(as_number)
					.any(|t| (n - t).abs() < f64::EPSILON);
				Ok(found == (condition.operator == OperatorType::In))
			}
		},
		Subject::Text(text) => match condition.operator {
			OperatorType::Equal => Ok(text.is_some() && text.map(str::to_string) == as_key(value)),
			OperatorType::NotEqual => Ok(text.map(str::to_string) != as_key(value)),
			OperatorType::In => {
				let items = list()?;
				Ok(text.is_some_and(|t| items.iter().any(|i| i == t)))
			}
			OperatorType::NotIn => {
				let items = list()?;
				Ok(!text.is_some_and(|t| items.iter().any(|i| i == t)))
			}
			OperatorType::GreaterThan | OperatorType::LessThan => {
				Err(invalid("ordering operators require a numeric subject"))
			}
		},
		Subject::Set(set) => match condition.operator {
			OperatorType::Equal => {
				let key = as_key(value).ok_or_else(|| invalid("expected a scalar value"))?;
				Ok(set.contains(&key))
			}
			OperatorType::NotEqual => {
				let key = as_key(value).ok_or_else(|| invalid("expected a scalar value"))?;
				Ok(!set.contains(&key))
			}
			OperatorType::In => {
				let items = list()?;
				Ok(set.iter().any(|s| items.contains(s)))
			}
			OperatorType::NotIn => {
				let items = list()?;
				Ok(!set.iter().any(|s| items.contains(s)))
			}
			OperatorType::GreaterThan | OperatorType::LessThan => {
				Err(invalid("ordering operators are not supported on sets"))
			}
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;
	use proptest::prelude::*;
	use serde_json::json;

	fn voucher() -> Voucher {
		let now = Utc::now();
		Voucher {
			id: "v1".to_string(),
			application_id: "app".to_string(),
			voucher_code: "HEMAT10".to_string(),
			voucher_name: "Hemat 10%".to_string(),
			description: None,
			voucher_type: VoucherType::Public,
			discount_type: DiscountType::Percentage,
			discount_value: 10.0,
			max_discount: Some(25_000),
			min_transaction: 50_000,
			usage_limit: Some(100),
			usage_count: 0,
			usage_limit_per_user: Some(1),
			valid_from: Some(now - Duration::days(1)),
			valid_until: Some(now + Duration::days(1)),
			is_active: true,
			is_auto_apply: false,
			applicable_products: None,
			created_at: now,
			updated_at: now,
		}
	}

	fn condition(
		condition_type: ConditionType,
		operator: OperatorType,
		value: Value,
		is_required: bool,
	) -> VoucherCondition {
		let now = Utc::now();
		VoucherCondition {
			id: uuid::Uuid::new_v4().to_string(),
			voucher_id: "v1".to_string(),
			condition_type,
			operator,
			condition_value: value,
			is_required,
			created_at: now,
			updated_at: now,
		}
	}

	fn ctx(subtotal: i64) -> VoucherContext {
		VoucherContext::new("user-1", subtotal, Utc::now())
	}

	#[test]
	fn test_percentage_discount_capped_by_max() {
		assert_eq!(voucher().evaluate(&[], &ctx(100_000)), Ok(10_000));
		assert_eq!(voucher().evaluate(&[], &ctx(1_000_000)), Ok(25_000));
	}

	#[test]
	fn test_fixed_discount_capped_by_subtotal() {
		let mut v = voucher();
		v.discount_type = DiscountType::Fixed;
		v.discount_value = 80_000.0;
		v.min_transaction = 0;
		assert_eq!(v.evaluate(&[], &ctx(60_000)), Ok(60_000));
	}

	#[test]
	fn test_inactive_checked_first() {
		let mut v = voucher();
		v.is_active = false;
		v.valid_until = Some(Utc::now() - Duration::days(3));
		assert_eq!(v.evaluate(&[], &ctx(100_000)), Err(VoucherRejection::Inactive));
	}

	#[test]
	fn test_validity_window() {
		let mut v = voucher();
		v.valid_from = Some(Utc::now() + Duration::hours(1));
		assert_eq!(v.evaluate(&[], &ctx(100_000)), Err(VoucherRejection::NotYetValid));

		let mut v = voucher();
		v.valid_until = Some(Utc::now() - Duration::hours(1));
		assert_eq!(v.evaluate(&[], &ctx(100_000)), Err(VoucherRejection::Expired));
	}

	#[test]
	fn test_usage_limits() {
		let mut v = voucher();
		v.usage_count = 100;
		assert_eq!(
			v.evaluate(&[], &ctx(100_000)),
			Err(VoucherRejection::UsageLimitReached)
		);

		let mut c = ctx(100_000);
		c.user_usage_count = 1;
		assert_eq!(
			voucher().evaluate(&[], &c),
			Err(VoucherRejection::UserLimitReached)
		);
	}

	#[test]
	fn test_minimum_transaction() {
		assert_eq!(
			voucher().evaluate(&[], &ctx(49_999)),
			Err(VoucherRejection::MinimumNotMet { required: 50_000 })
		);
	}

	#[test]
	fn test_private_voucher_requires_live_eligibility() {
		let mut v = voucher();
		v.voucher_type = VoucherType::Private;
		let mut c = ctx(100_000);
		assert_eq!(v.evaluate(&[], &c), Err(VoucherRejection::NotEligible));

		c.eligibility = Some(VoucherEligibleUser {
			id: "e1".to_string(),
			voucher_id: "v1".to_string(),
			user_id: "user-1".to_string(),
			application_id: "app".to_string(),
			eligible_at: c.now - Duration::days(2),
			notified_at: None,
			expires_at: Some(c.now - Duration::days(1)),
			is_claimed: false,
			claimed_at: None,
		});
		assert_eq!(v.evaluate(&[], &c), Err(VoucherRejection::NotEligible));

		if let Some(e) = c.eligibility.as_mut() {
			e.expires_at = None;
		}
		assert_eq!(v.evaluate(&[], &c), Ok(10_000));
	}

	#[test]
	fn test_required_condition_on_payment_method() {
		let conds = [condition(
			ConditionType::PaymentMethod,
			OperatorType::In,
			json!({"value": ["QRIS", "OVO"]}),
			true,
		)];
		let mut c = ctx(100_000);
		assert_eq!(
			voucher().evaluate(&conds, &c),
			Err(VoucherRejection::ConditionFailed {
				condition_type: ConditionType::PaymentMethod
			})
		);
		c.payment_method_code = Some("QRIS".to_string());
		assert_eq!(voucher().evaluate(&conds, &c), Ok(10_000));
	}

	#[test]
	fn test_optional_conditions_need_one_pass() {
		let conds = [
			condition(ConditionType::ProductId, OperatorType::Equal, json!("p-9"), false),
			condition(ConditionType::UserSegment, OperatorType::In, json!(["gold"]), false),
		];
		let mut c = ctx(100_000);
		c.product_ids = vec!["p-1".to_string()];
		assert!(matches!(
			voucher().evaluate(&conds, &c),
			Err(VoucherRejection::ConditionFailed { .. })
		));
		c.user_segments = vec!["gold".to_string()];
		assert_eq!(voucher().evaluate(&conds, &c), Ok(10_000));
	}

	#[test]
	fn test_numeric_condition() {
		let conds = [condition(
			ConditionType::MinAmount,
			OperatorType::GreaterThan,
			json!(75_000),
			true,
		)];
		assert!(voucher().evaluate(&conds, &ctx(70_000)).is_err());
		assert_eq!(voucher().evaluate(&conds, &ctx(80_000)), Ok(8_000));
	}

	#[test]
	fn test_ordering_on_set_is_invalid() {
		let conds = [condition(
			ConditionType::CategoryId,
			OperatorType::LessThan,
			json!(3),
			true,
		)];
		assert!(matches!(
			voucher().evaluate(&conds, &ctx(100_000)),
			Err(VoucherRejection::InvalidCondition { .. })
		));
	}

	#[test]
	fn test_not_in_on_set_requires_disjoint() {
		let conds = [condition(
			ConditionType::CategoryId,
			OperatorType::NotIn,
			json!(["alcohol"]),
			true,
		)];
		let mut c = ctx(100_000);
		c.category_ids = vec!["food".to_string(), "alcohol".to_string()];
		assert!(voucher().evaluate(&conds, &c).is_err());
		c.category_ids = vec!["food".to_string()];
		assert!(voucher().evaluate(&conds, &c).is_ok());
	}

	proptest! {
		#[test]
		fn prop_discount_within_subtotal(
			subtotal in 0i64..10_000_000_000,
			value in 0.0f64..200.0,
			cap in proptest::option::of(0i64..1_000_000),
			fixed in any::<bool>()
		) {
			let mut v = voucher();
			v.discount_type = if fixed { DiscountType::Fixed } else { DiscountType::Percentage };
			v.discount_value = if fixed { value * 10_000.0 } else { value };
			v.max_discount = cap;
			let d = v.discount_for(subtotal);
			prop_assert!(d >= 0);
			prop_assert!(d <= subtotal);
			if let (false, Some(cap)) = (fixed, cap) {
				prop_assert!(d <= cap);
			}
		}
	}
}
