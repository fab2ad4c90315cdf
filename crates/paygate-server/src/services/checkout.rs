// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Checkout: turn a cart into a pending transaction.
//!
//! Validation happens up front against the catalog; stock and voucher usage
//! limits are enforced again by the repository inside the write transaction,
//! so a concurrent checkout that wins the race surfaces as a conflict.

use chrono::{DateTime, Duration, Utc};
use paygate_core::codes::{invoice_number, transaction_code};
use paygate_core::{
	AdminFee, PaymentGateway, PaymentMethod, Product, Quote, QuoteLine, Transaction,
	TransactionItem, TransactionStatus, Voucher, VoucherUsage,
};
use paygate_server_api::CheckoutRequest;
use paygate_server_config::PaymentsConfig;
use tracing::instrument;
use uuid::Uuid;

use crate::api::Repositories;
use crate::error::{Result, ServerError};
use crate::services::vouchers::{self, VoucherCheck};

/// A created transaction and its items.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
	pub transaction: Transaction,
	pub items: Vec<TransactionItem>,
}

/// Sum quantities of repeated products, keeping first-seen order.
fn merge_lines(request: &CheckoutRequest) -> Result<Vec<(String, i64)>> {
	if request.items.is_empty() {
		return Err(ServerError::validation("at least one item is required"));
	}
	let mut lines: Vec<(String, i64)> = Vec::with_capacity(request.items.len());
	for item in &request.items {
		if item.quantity <= 0 {
			return Err(ServerError::validation(format!(
				"quantity for product {} must be positive",
				item.product_id
			)));
		}
		match lines.iter_mut().find(|(id, _)| *id == item.product_id) {
			Some((_, quantity)) => {
				*quantity = quantity
					.checked_add(item.quantity)
					.ok_or_else(|| ServerError::validation("quantity is too large"))?;
			}
			None => lines.push((item.product_id.clone(), item.quantity)),
		}
	}
	Ok(lines)
}

async fn load_products(
	repos: &Repositories,
	application_id: &str,
	currency: &str,
	lines: &[(String, i64)],
) -> Result<Vec<(Product, i64)>> {
	let mut products = Vec::with_capacity(lines.len());
	for (product_id, quantity) in lines {
		let product = repos
			.products
			.get(product_id)
			.await?
			.ok_or_else(|| ServerError::not_found(format!("Product {product_id}")))?;
		if product.application_id != application_id {
			return Err(ServerError::business_rule(format!(
				"product {} does not belong to this application",
				product.product_code
			)));
		}
		if !product.is_active {
			return Err(ServerError::business_rule(format!(
				"product {} is not available",
				product.product_code
			)));
		}
		if !product.is_purchasable(*quantity) {
			return Err(ServerError::business_rule(format!(
				"insufficient stock for product {}: requested {}, available {}",
				product.product_code, quantity, product.stock
			)));
		}
		if !product.currency.eq_ignore_ascii_case(currency) {
			return Err(ServerError::validation(format!(
				"product {} is priced in {}, not {}",
				product.product_code, product.currency, currency
			)));
		}
		products.push((product, *quantity));
	}
	Ok(products)
}

async fn load_payment(
	repos: &Repositories,
	payment_method_id: &str,
) -> Result<(PaymentMethod, PaymentGateway)> {
	let method = repos
		.payment_methods
		.get_method(payment_method_id)
		.await?
		.ok_or_else(|| ServerError::not_found("Payment method"))?;
	if !method.is_active {
		return Err(ServerError::business_rule(format!(
			"payment method {} is not active",
			method.method_code
		)));
	}
	let gateway = repos
		.payment_methods
		.select_gateway_for_method(&method.id)
		.await?
		.ok_or_else(|| {
			ServerError::business_rule(format!(
				"no active gateway for payment method {}",
				method.method_code
			))
		})?;
	Ok((method, gateway))
}

async fn load_voucher(repos: &Repositories, application_id: &str, code: &str) -> Result<Voucher> {
	match repos.vouchers.get_by_code(code).await? {
		Some(voucher) if voucher.application_id == application_id => Ok(voucher),
		_ => Err(ServerError::not_found(format!("Voucher {code}"))),
	}
}

#[instrument(
	skip(repos, payments, request),
	fields(application_id = %request.application_id, user_id = %request.user_id, items = request.items.len())
)]
pub async fn checkout(
	repos: &Repositories,
	payments: &PaymentsConfig,
	request: CheckoutRequest,
	now: DateTime<Utc>,
) -> Result<CheckoutOutcome> {
	let lines = merge_lines(&request)?;

	let application = repos
		.applications
		.get(&request.application_id)
		.await?
		.ok_or_else(|| ServerError::not_found("Application"))?;
	if !application.is_active {
		return Err(ServerError::business_rule(format!(
			"application {} is not active",
			application.app_code
		)));
	}

	let currency = request
		.currency
		.as_deref()
		.map(str::trim)
		.filter(|c| !c.is_empty())
		.unwrap_or(&payments.default_currency)
		.to_ascii_uppercase();
	let products = load_products(repos, &application.id, &currency, &lines).await?;

	let payment = match request.payment_method_id.as_deref() {
		Some(id) => Some(load_payment(repos, id).await?),
		None => None,
	};
	let fee = payment
		.as_ref()
		.map(|(method, _)| method.fee())
		.unwrap_or_else(AdminFee::none);

	let quote_lines: Vec<QuoteLine> = products
		.iter()
		.map(|(product, quantity)| QuoteLine {
			product_id: product.id.clone(),
			unit_price: product.price,
			quantity: *quantity,
		})
		.collect();
	let subtotal = Quote::build(&quote_lines, 0, &AdminFee::none())?.subtotal;

	let voucher = match request.voucher_code.as_deref().map(str::trim) {
		Some(code) if !code.is_empty() => {
			let voucher = load_voucher(repos, &application.id, code).await?;
			let product_ids: Vec<String> = products.iter().map(|(p, _)| p.id.clone()).collect();
			let mut category_ids: Vec<String> = Vec::new();
			for category in products.iter().filter_map(|(p, _)| p.category_id.clone()) {
				if !category_ids.contains(&category) {
					category_ids.push(category);
				}
			}
			let check = VoucherCheck {
				user_id: request.user_id.clone(),
				subtotal,
				product_ids,
				category_ids,
				payment_method_code: payment.as_ref().map(|(m, _)| m.method_code.clone()),
				user_segments: request.user_segments.clone(),
			};
			let discount = vouchers::evaluate(repos, &voucher, check, now).await??;
			Some((voucher, discount))
		}
		_ => None,
	};

	let discount = voucher.as_ref().map(|(_, d)| *d).unwrap_or(0);
	let quote = Quote::build(&quote_lines, discount, &fee)?;

	let transaction = Transaction {
		id: Uuid::new_v4().to_string(),
		application_id: application.id.clone(),
		user_id: request.user_id.clone(),
		transaction_code: transaction_code(now),
		invoice_number: invoice_number(now),
		payment_method_id: payment.as_ref().map(|(m, _)| m.id.clone()),
		gateway_id: payment.as_ref().map(|(_, g)| g.id.clone()),
		voucher_id: voucher.as_ref().map(|(v, _)| v.id.clone()),
		status: TransactionStatus::Pending,
		subtotal: quote.subtotal,
		discount_amount: quote.discount_amount,
		admin_fee: quote.admin_fee,
		total_amount: quote.total_amount,
		currency,
		payment_url: None,
		payment_token: None,
		payment_reference: None,
		va_number: None,
		qr_code_url: None,
		paid_at: None,
		expired_at: Some(now + Duration::minutes(i64::from(payments.transaction_ttl_minutes))),
		notes: request.notes.clone(),
		extra_data: None,
		created_at: now,
		updated_at: now,
	};

	let mut items = Vec::with_capacity(products.len());
	for (product, quantity) in &products {
		items.push(TransactionItem {
			id: Uuid::new_v4().to_string(),
			transaction_id: transaction.id.clone(),
			product_id: product.id.clone(),
			product_name: product.product_name.clone(),
			product_code: product.product_code.clone(),
			quantity: *quantity,
			unit_price: product.price,
			subtotal: QuoteLine {
				product_id: product.id.clone(),
				unit_price: product.price,
				quantity: *quantity,
			}
			.subtotal()?,
			item_metadata: None,
			created_at: now,
		});
	}

	let usage = voucher.as_ref().map(|(v, _)| VoucherUsage {
		id: Uuid::new_v4().to_string(),
		voucher_id: v.id.clone(),
		user_id: transaction.user_id.clone(),
		application_id: transaction.application_id.clone(),
		transaction_id: transaction.id.clone(),
		used_at: now,
	});

	repos
		.transactions
		.create(&transaction, &items, usage.as_ref())
		.await?;

	Ok(CheckoutOutcome { transaction, items })
}
