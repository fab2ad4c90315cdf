// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Paygate payment server.
//!
//! Serves the checkout, voucher and gateway webhook API over a SQLite store
//! and runs the background jobs that keep transactions and callbacks tidy.

pub mod api;
pub mod api_docs;
pub mod cors;
pub mod error;
pub mod extract;
pub mod jobs;
pub mod pagination;
pub mod request_id;
pub mod routes;
pub mod services;
pub mod telemetry;
pub mod version;

pub use api::{create_app_state, create_router, AppState, Repositories};
pub use api_docs::ApiDoc;
pub use error::ServerError;
pub use paygate_server_config::ServerConfig;
