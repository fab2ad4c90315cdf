// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Human-facing transaction identifiers.

use chrono::{DateTime, Utc};

fn suffix() -> String {
	format!("{:08X}", fastrand::u32(..))
}

/// `TRX-YYYYMMDD-XXXXXXXX`
pub fn transaction_code(now: DateTime<Utc>) -> String {
	format!("TRX-{}-{}", now.format("%Y%m%d"), suffix())
}

/// `INV/YYYYMMDD/XXXXXXXX`
pub fn invoice_number(now: DateTime<Utc>) -> String {
	format!("INV/{}/{}", now.format("%Y%m%d"), suffix())
}
