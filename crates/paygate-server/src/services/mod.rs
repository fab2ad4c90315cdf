// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Business operations shared by handlers and background jobs.

pub mod checkout;
pub mod vouchers;
pub mod webhook;
