// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database layer for Paygate server.
//!
//! SQLite pools, the named-database manager, schema migrations, the criteria
//! filter engine and one repository per aggregate.

pub mod application;
pub mod callback;
pub mod error;
pub mod filter;
pub mod job;
pub mod json;
pub mod manager;
pub mod migrations;
pub mod payment;
pub mod pool;
pub mod product;
pub mod time;
pub mod transaction;
pub mod voucher;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use application::{Application, ApplicationRepository};
pub use callback::{CallbackRepository, CALLBACK_FILTER};
pub use error::{DbError, Result};
pub use filter::{
	Criteria, FilterError, FilterSchema, ListQuery, Operator, Page, PageMeta, SortDirection,
	SortKey, DEFAULT_LIMIT, MAX_LIMIT,
};
pub use job::{JobDefinition, JobRepository, JobRun, JobStatus, TriggerSource};
pub use manager::{
	DatabaseHealth, DatabaseManager, ANALYTICS_DATABASE, PRIMARY_DATABASE, REPLICA_DATABASE,
};
pub use migrations::{create_revision, MigrationInfo, MigrationRunner, Revision, MIGRATOR};
pub use payment::PaymentMethodRepository;
pub use pool::{begin_write, create_pool};
pub use product::{ProductRepository, PRODUCT_FILTER};
pub use sqlx::SqlitePool;
pub use transaction::{TransactionRepository, TRANSACTION_FILTER};
pub use voucher::{VoucherRepository, VoucherUpdate, VOUCHER_FILTER};
