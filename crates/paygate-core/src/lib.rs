// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core domain types and business rules for Paygate.
//!
//! Nothing in this crate touches the database or the network. Amounts are
//! integer minor units of the transaction currency.

pub mod callback;
pub mod codes;
pub mod enums;
pub mod error;
pub mod fee;
pub mod notification;
pub mod payment;
pub mod pricing;
pub mod product;
pub mod transaction;
pub mod voucher;

pub use callback::GatewayCallback;
pub use enums::{
	AdminFeeType, CallbackType, ChangedBy, ConditionType, DiscountType, GatewayType, MethodType,
	OperatorType, RequestType, TransactionStatus, VoucherType,
};
pub use error::{DomainError, Result, VoucherRejection};
pub use fee::AdminFee;
pub use notification::GatewayNotification;
pub use payment::{GatewayCredential, PaymentGateway, PaymentMethod, PaymentMethodGateway};
pub use pricing::{Quote, QuoteLine};
pub use product::{Product, ProductCategory};
pub use transaction::{Transaction, TransactionItem, TransactionLog, Transition};
pub use voucher::{
	Voucher, VoucherCondition, VoucherContext, VoucherEligibleUser, VoucherUsage,
};
