// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! OpenAPI documentation for paygate-server.
//!
//! The raw JSON document is served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Paygate API",
        version = "1.0.0",
        description = "Payment service: product catalogue, checkout with vouchers and admin fees, and payment gateway notifications.",
        license(name = "Proprietary"),
        contact(
            name = "Geoffrey Huntley",
            email = "ghuntley@ghuntley.com",
            url = "https://ghuntley.com"
        )
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    tags(
        (name = "health", description = "Database and migration status"),
        (name = "payment-methods", description = "Payment methods and admin fee quotes"),
        (name = "products", description = "Product catalogue"),
        (name = "transactions", description = "Checkout, status history and cancellation"),
        (name = "vouchers", description = "Voucher management, eligibility and validation"),
        (name = "webhooks", description = "Gateway notifications and callback administration")
    ),
    paths(
        crate::routes::health::health_check,
        crate::routes::payment_methods::list_payment_methods,
        crate::routes::payment_methods::get_payment_method,
        crate::routes::payment_methods::calculate_fee,
        crate::routes::products::list_products,
        crate::routes::products::get_product,
        crate::routes::transactions::list_transactions,
        crate::routes::transactions::checkout,
        crate::routes::transactions::get_transaction,
        crate::routes::transactions::get_transaction_logs,
        crate::routes::transactions::cancel_transaction,
        crate::routes::vouchers::list_vouchers,
        crate::routes::vouchers::create_voucher,
        crate::routes::vouchers::list_public_vouchers,
        crate::routes::vouchers::my_vouchers,
        crate::routes::vouchers::get_voucher,
        crate::routes::vouchers::update_voucher,
        crate::routes::vouchers::add_eligible_users,
        crate::routes::vouchers::list_conditions,
        crate::routes::vouchers::add_condition,
        crate::routes::vouchers::validate_voucher,
        crate::routes::vouchers::claim_voucher,
        crate::routes::webhooks::receive_webhook,
        crate::routes::webhooks::test_signature,
        crate::routes::webhooks::list_callbacks,
        crate::routes::webhooks::retry_callback,
    ),
    components(
        schemas(
            paygate_server_api::ErrorResponse,
            paygate_server_api::ErrorBody,
            paygate_server_api::HealthResponse,
            paygate_server_api::HealthStatus,
            paygate_server_api::DatabaseHealthResponse,
            paygate_server_api::MigrationStatusResponse,
            paygate_server_api::PaymentMethodResponse,
            paygate_server_api::CalculateFeeRequest,
            paygate_server_api::CalculateFeeResponse,
            paygate_server_api::CheckoutItemRequest,
            paygate_server_api::CheckoutRequest,
            paygate_server_api::CancelTransactionRequest,
            paygate_server_api::TransactionResponse,
            paygate_server_api::CreateVoucherRequest,
            paygate_server_api::UpdateVoucherRequest,
            paygate_server_api::EligibleUsersRequest,
            paygate_server_api::EligibleUsersResponse,
            paygate_server_api::CreateConditionRequest,
            paygate_server_api::ValidateVoucherRequest,
            paygate_server_api::ValidateVoucherResponse,
            paygate_server_api::ClaimVoucherRequest,
            paygate_server_api::WebhookProcessedResponse,
            paygate_server_api::WebhookTestRequest,
            paygate_server_api::WebhookTestResponse,
            paygate_core::Product,
            paygate_core::PaymentMethod,
            paygate_core::Transaction,
            paygate_core::TransactionItem,
            paygate_core::TransactionLog,
            paygate_core::TransactionStatus,
            paygate_core::Voucher,
            paygate_core::VoucherCondition,
            paygate_core::VoucherEligibleUser,
            paygate_core::GatewayCallback,
        )
    )
)]
pub struct ApiDoc;
