// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP route handlers, one module per resource.

pub mod health;
pub mod payment_methods;
pub mod products;
pub mod transactions;
pub mod vouchers;
pub mod webhooks;
