// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! JSON documents stored in TEXT columns.

use serde_json::Value;

use crate::error::Result;

pub fn encode_opt(value: Option<&Value>) -> Option<String> {
	value.map(Value::to_string)
}

pub fn decode(value: &str) -> Result<Value> {
	Ok(serde_json::from_str(value)?)
}

pub fn decode_opt(value: Option<String>) -> Result<Option<Value>> {
	value.as_deref().map(decode).transpose()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::DbError;
	use serde_json::json;

	#[test]
	fn test_decode_opt() {
		assert_eq!(decode_opt(None).unwrap(), None);
		assert_eq!(
			decode_opt(Some(r#"{"a":[1,2]}"#.to_string())).unwrap(),
			Some(json!({"a": [1, 2]}))
		);
		assert!(matches!(
			decode_opt(Some("{oops".to_string())),
			Err(DbError::Serialization(_))
		));
	}

	#[test]
	fn test_encode_opt() {
		assert_eq!(encode_opt(Some(&json!(["x"]))).as_deref(), Some(r#"["x"]"#));
		assert_eq!(encode_opt(None), None);
	}
}
