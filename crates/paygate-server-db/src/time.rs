// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Timestamp encoding for TEXT columns.
//!
//! Every timestamp is written with a fixed width (microseconds, `Z` suffix) so
//! that lexical comparison in SQL matches chronological order.

use chrono::{DateTime, Utc};

use crate::error::{DbError, Result};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Current time truncated to the stored precision.
pub fn now() -> DateTime<Utc> {
	let now = Utc::now();
	DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

pub fn encode(ts: DateTime<Utc>) -> String {
	ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn encode_opt(ts: Option<DateTime<Utc>>) -> Option<String> {
	ts.map(encode)
}

pub fn decode(column: &str, value: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|_| DbError::Internal(format!("Invalid {column}: {value}")))
}

pub fn decode_opt(column: &str, value: Option<String>) -> Result<Option<DateTime<Utc>>> {
	value.map(|v| decode(column, &v)).transpose()
}
