// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Signing and verification of payment gateway webhook deliveries.
//!
//! Gateways sign the raw request body with HMAC-SHA256 using the merchant's
//! webhook secret and send the hex digest in [`SIGNATURE_HEADER`], either bare
//! or prefixed with `sha256=`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "x-paygate-signature";

const SIGNATURE_PREFIX: &str = "sha256=";
const SIGNATURE_HEX_LEN: usize = 64;

/// Sign a webhook body. Returns the lowercase hex digest without a prefix.
pub fn compute_signature(secret: &[u8], body: &[u8]) -> String {
	let mut mac = match HmacSha256::new_from_slice(secret) {
		Ok(mac) => mac,
		// HMAC accepts keys of any length; this arm is unreachable in practice.
		Err(_) => return String::new(),
	};
	mac.update(body);
	hex::encode(mac.finalize().into_bytes())
}

/// Check a webhook body against a hex signature (no prefix).
///
/// Comparison is constant time.
pub fn verify_signature(secret: &[u8], body: &[u8], signature: &str) -> bool {
	let Ok(expected) = hex::decode(signature) else {
		return false;
	};
	let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
		return false;
	};
	mac.update(body);
	mac.verify_slice(&expected).is_ok()
}

/// Normalize a signature header value.
///
/// Accepts `sha256=<hex>` or bare hex, ignoring surrounding whitespace and
/// case. Returns `None` when the value is not a 32-byte hex digest.
pub fn parse_signature_header(value: &str) -> Option<String> {
	let trimmed = value.trim();
	let digest = match trimmed.get(..SIGNATURE_PREFIX.len()) {
		Some(prefix) if prefix.eq_ignore_ascii_case(SIGNATURE_PREFIX) => &trimmed[SIGNATURE_PREFIX.len()..],
		_ => trimmed,
	};

	if digest.len() != SIGNATURE_HEX_LEN || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
		return None;
	}

	Some(digest.to_ascii_lowercase())
}

/// Verify a raw header value against a body.
pub fn verify_signature_header(secret: &[u8], body: &[u8], header_value: &str) -> bool {
	parse_signature_header(header_value)
		.map(|sig| verify_signature(secret, body, &sig))
		.unwrap_or(false)
}

#[cfg(test)]
mod tests {
	use super::*;

	const SECRET: &[u8] = b"whsec_midtrans_sandbox";
	const BODY: &[u8] = br#"{"order_id":"INV/20250101/0A1B2C3D","transaction_status":"settlement"}"#;

	#[test]
	fn test_compute_signature_is_hex_digest() {
		let sig = compute_signature(SECRET, BODY);
		assert_eq!(sig.len(), 64);
		assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
	}

	#[test]
	fn test_verify_signature_accepts_own_signature() {
		let sig = compute_signature(SECRET, BODY);
		assert!(verify_signature(SECRET, BODY, &sig));
	}

	#[test]
	fn test_verify_signature_rejects_other_secret() {
		let sig = compute_signature(SECRET, BODY);
		assert!(!verify_signature(b"whsec_other", BODY, &sig));
	}

	#[test]
	fn test_verify_signature_rejects_modified_body() {
		let sig = compute_signature(SECRET, BODY);
		assert!(!verify_signature(SECRET, b"{}", &sig));
	}

	#[test]
	fn test_verify_signature_rejects_garbage() {
		assert!(!verify_signature(SECRET, BODY, "zz-not-hex"));
	}

	#[test]
	fn test_parse_header_with_prefix() {
		let sig = compute_signature(SECRET, BODY);
		let header = format!("  SHA256={}  ", sig.to_uppercase());
		assert_eq!(parse_signature_header(&header), Some(sig));
	}

	#[test]
	fn test_parse_header_bare() {
		let sig = compute_signature(SECRET, BODY);
		assert_eq!(parse_signature_header(&sig), Some(sig.clone()));
	}

	#[test]
	fn test_parse_header_rejects_short_digest() {
		assert_eq!(parse_signature_header("sha256=abcd"), None);
		assert_eq!(parse_signature_header(""), None);
	}

	#[test]
	fn test_verify_signature_header() {
		let header = format!("sha256={}", compute_signature(SECRET, BODY));
		assert!(verify_signature_header(SECRET, BODY, &header));
		assert!(!verify_signature_header(SECRET, BODY, "sha256="));
	}
}
