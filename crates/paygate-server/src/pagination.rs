// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared list-query handling for API handlers.

use paygate_server_api::ListParams;
use paygate_server_db::{FilterSchema, ListQuery, DEFAULT_LIMIT, MAX_LIMIT};

use crate::error::ServerError;

pub fn limit_clamped(params: &ListParams) -> i64 {
	params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT).max(1)
}

pub fn offset_or_default(params: &ListParams) -> i64 {
	params.offset.unwrap_or(0).max(0)
}

/// Parse `criteria` and `sortby` against `schema`. A bad filter is a 400.
pub fn list_query(params: &ListParams, schema: &FilterSchema) -> Result<ListQuery, ServerError> {
	Ok(ListQuery::from_params(
		params.criteria.as_deref(),
		params.sortby.as_deref(),
		limit_clamped(params),
		offset_or_default(params),
		schema,
	)?)
}
