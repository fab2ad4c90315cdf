// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fixtures for tests that need a migrated database.

use std::path::Path;

use paygate_core::codes::{invoice_number, transaction_code};
use paygate_core::{
	AdminFeeType, CallbackType, DiscountType, GatewayCallback, GatewayCredential, GatewayType,
	MethodType, PaymentGateway, PaymentMethod, PaymentMethodGateway, Product, ProductCategory,
	Transaction, TransactionItem, TransactionStatus, Voucher, VoucherType, VoucherUsage,
};
use paygate_server_config::DatabaseConnectionConfig;
use serde_json::Value;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::application::{Application, ApplicationRepository};
use crate::migrations::MIGRATOR;
use crate::payment::PaymentMethodRepository;
use crate::pool::create_pool;
use crate::product::ProductRepository;
use crate::time;

fn id() -> String {
	Uuid::new_v4().to_string()
}

/// In-memory database with every migration applied.
pub async fn create_test_pool() -> SqlitePool {
	let pool = create_pool(&DatabaseConnectionConfig::in_memory())
		.await
		.unwrap();
	MIGRATOR.run(&pool).await.unwrap();
	pool
}

/// WAL file database under `dir` with every migration applied. Unlike the
/// in-memory pool this one hands out several connections, so writers contend.
pub async fn create_file_test_pool(dir: &Path) -> SqlitePool {
	let path = dir.join("paygate.db");
	let pool = create_pool(&DatabaseConnectionConfig::sqlite(path.to_string_lossy()))
		.await
		.unwrap();
	MIGRATOR.run(&pool).await.unwrap();
	pool
}

pub fn application(app_code: &str) -> Application {
	let now = time::now();
	Application {
		id: id(),
		app_code: app_code.to_string(),
		app_name: format!("{app_code} app"),
		description: None,
		is_active: true,
		created_at: now,
		updated_at: now,
	}
}

pub async fn seed_application(pool: &SqlitePool, app_code: &str) -> Application {
	let app = application(app_code);
	ApplicationRepository::new(pool.clone())
		.create(&app)
		.await
		.unwrap();
	app
}

pub fn category(name: &str) -> ProductCategory {
	let now = time::now();
	ProductCategory {
		id: id(),
		category_name: name.to_string(),
		description: None,
		created_at: now,
		updated_at: now,
	}
}

pub fn product(application_id: &str, code: &str, price: i64, stock: i64) -> Product {
	let now = time::now();
	Product {
		id: id(),
		application_id: application_id.to_string(),
		category_id: None,
		product_code: code.to_string(),
		product_name: format!("Product {code}"),
		description: None,
		price,
		currency: "IDR".to_string(),
		stock,
		is_active: true,
		metadata: None,
		created_at: now,
		updated_at: now,
	}
}

pub fn payment_method(code: &str, fee_type: AdminFeeType, fee: f64) -> PaymentMethod {
	let now = time::now();
	PaymentMethod {
		id: id(),
		method_code: code.to_string(),
		method_name: format!("{code} method"),
		method_type: MethodType::VirtualAccount,
		provider: None,
		icon_url: None,
		is_active: true,
		admin_fee: fee,
		admin_fee_type: fee_type,
		created_at: now,
		updated_at: now,
	}
}

pub fn gateway(code: &str, gateway_type: GatewayType, priority: i64) -> PaymentGateway {
	let now = time::now();
	PaymentGateway {
		id: id(),
		gateway_code: code.to_string(),
		gateway_name: format!("{code} gateway"),
		gateway_type,
		base_url: format!("https://{code}.example.test"),
		is_active: true,
		is_sandbox: true,
		priority,
		supported_methods: None,
		created_at: now,
		updated_at: now,
	}
}

pub fn method_gateway(payment_method_id: &str, gateway_id: &str) -> PaymentMethodGateway {
	let now = time::now();
	PaymentMethodGateway {
		id: id(),
		payment_method_id: payment_method_id.to_string(),
		gateway_id: gateway_id.to_string(),
		gateway_method_code: "bank_transfer".to_string(),
		is_active: true,
		processing_time_minutes: 5,
		created_at: now,
		updated_at: now,
	}
}

pub fn credential(
	application_id: &str,
	gateway_id: &str,
	webhook_secret: Option<&str>,
) -> GatewayCredential {
	let now = time::now();
	GatewayCredential {
		id: id(),
		application_id: application_id.to_string(),
		gateway_id: gateway_id.to_string(),
		merchant_id: Some("M-001".to_string()),
		api_key: Some("key".to_string()),
		api_secret: Some("secret".to_string()),
		client_key: None,
		webhook_secret: webhook_secret.map(str::to_string),
		additional_config: None,
		is_active: true,
		created_at: now,
		updated_at: now,
	}
}

/// Active public voucher worth 10 percent.
pub fn voucher(application_id: &str, code: &str) -> Voucher {
	let now = time::now();
	Voucher {
		id: id(),
		application_id: application_id.to_string(),
		voucher_code: code.to_string(),
		voucher_name: format!("Voucher {code}"),
		description: None,
		voucher_type: VoucherType::Public,
		discount_type: DiscountType::Percentage,
		discount_value: 10.0,
		max_discount: None,
		min_transaction: 0,
		usage_limit: None,
		usage_count: 0,
		usage_limit_per_user: None,
		valid_from: None,
		valid_until: None,
		is_active: true,
		is_auto_apply: false,
		applicable_products: None,
		created_at: now,
		updated_at: now,
	}
}

pub fn voucher_usage(voucher: &Voucher, transaction: &Transaction) -> VoucherUsage {
	VoucherUsage {
		id: id(),
		voucher_id: voucher.id.clone(),
		user_id: transaction.user_id.clone(),
		application_id: transaction.application_id.clone(),
		transaction_id: transaction.id.clone(),
		used_at: transaction.created_at,
	}
}

/// Signed, unprocessed payment notification.
pub fn callback(gateway_id: &str, payload: Value) -> GatewayCallback {
	GatewayCallback {
		id: id(),
		transaction_id: None,
		gateway_id: gateway_id.to_string(),
		callback_type: CallbackType::PaymentNotification,
		raw_payload: payload,
		signature: Some("abc123".to_string()),
		is_signature_valid: true,
		is_processed: false,
		processed_at: None,
		attempts: 0,
		ip_address: Some("203.0.113.7".to_string()),
		user_agent: Some("gateway/1.0".to_string()),
		notes: None,
		created_at: time::now(),
	}
}

/// Everything a checkout needs: an application with one stocked product and
/// a payment method routed to one gateway.
pub struct CheckoutFixture {
	pub application: Application,
	pub product: Product,
	pub method: PaymentMethod,
	pub gateway: PaymentGateway,
	pub user_id: String,
}

pub async fn seed_checkout(pool: &SqlitePool) -> CheckoutFixture {
	let application = seed_application(pool, "shop").await;
	let product = product(&application.id, "GEMS-100", 15_000, 50);
	ProductRepository::new(pool.clone())
		.create(&product)
		.await
		.unwrap();

	let payments = PaymentMethodRepository::new(pool.clone());
	let method = payment_method("BCA_VA", AdminFeeType::Fixed, 4_000.0);
	payments.create_method(&method).await.unwrap();
	let gateway = gateway("midtrans", GatewayType::Midtrans, 1);
	payments.create_gateway(&gateway).await.unwrap();
	payments
		.link_method_gateway(&method_gateway(&method.id, &gateway.id))
		.await
		.unwrap();

	CheckoutFixture {
		application,
		product,
		method,
		gateway,
		user_id: "user-1".to_string(),
	}
}

/// A pending transaction buying `quantity` of the fixture product.
pub fn transaction(f: &CheckoutFixture, quantity: i64) -> (Transaction, Vec<TransactionItem>) {
	let now = time::now();
	let subtotal = f.product.price * quantity;
	let transaction = Transaction {
		id: id(),
		application_id: f.application.id.clone(),
		user_id: f.user_id.clone(),
		transaction_code: transaction_code(now),
		invoice_number: invoice_number(now),
		payment_method_id: Some(f.method.id.clone()),
		gateway_id: Some(f.gateway.id.clone()),
		voucher_id: None,
		status: TransactionStatus::Pending,
		subtotal,
		discount_amount: 0,
		admin_fee: 4_000,
		total_amount: subtotal + 4_000,
		currency: "IDR".to_string(),
		payment_url: None,
		payment_token: None,
		payment_reference: None,
		va_number: None,
		qr_code_url: None,
		paid_at: None,
		expired_at: Some(now + chrono::Duration::hours(24)),
		notes: None,
		extra_data: None,
		created_at: now,
		updated_at: now,
	};
	let item = TransactionItem {
		id: id(),
		transaction_id: transaction.id.clone(),
		product_id: f.product.id.clone(),
		product_name: f.product.product_name.clone(),
		product_code: f.product.product_code.clone(),
		quantity,
		unit_price: f.product.price,
		subtotal,
		item_metadata: None,
		created_at: now,
	};
	(transaction, vec![item])
}
