// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wire types for the Paygate HTTP API.

pub mod common;
pub mod health;
pub mod payment_methods;
pub mod transactions;
pub mod vouchers;
pub mod webhooks;

pub use common::{ErrorBody, ErrorResponse, ListParams};
pub use health::{DatabaseHealthResponse, HealthResponse, HealthStatus, MigrationStatusResponse};
pub use payment_methods::{
	CalculateFeeRequest, CalculateFeeResponse, PaymentMethodResponse, PaymentMethodsQuery,
};
pub use transactions::{
	CancelTransactionRequest, CheckoutItemRequest, CheckoutRequest, TransactionResponse,
};
pub use vouchers::{
	ClaimVoucherRequest, CreateConditionRequest, CreateVoucherRequest, EligibleUsersRequest,
	EligibleUsersResponse, MyVouchersQuery, UpdateVoucherRequest, ValidateVoucherRequest,
	ValidateVoucherResponse,
};
pub use webhooks::{WebhookProcessedResponse, WebhookTestRequest, WebhookTestResponse};
