// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Closed vocabularies stored as snake_case text in the database and on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

macro_rules! text_enum {
	(
		$(#[$meta:meta])*
		$name:ident { $($variant:ident => $text:literal),+ $(,)? }
	) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
		#[serde(rename_all = "snake_case")]
		pub enum $name {
			$(
				#[serde(rename = $text)]
				$variant,
			)+
		}

		impl $name {
			pub const ALL: &'static [$name] = &[$($name::$variant),+];

			pub fn as_str(&self) -> &'static str {
				match self {
					$($name::$variant => $text,)+
				}
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(self.as_str())
			}
		}

		impl FromStr for $name {
			type Err = DomainError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				match s {
					$($text => Ok($name::$variant),)+
					_ => Err(DomainError::UnknownVariant {
						kind: stringify!($name),
						value: s.to_string(),
					}),
				}
			}
		}
	};
}

text_enum! {
	/// How the customer pays.
	MethodType {
		VirtualAccount => "virtual_account",
		EWallet => "e_wallet",
		CreditCard => "credit_card",
		DebitCard => "debit_card",
		BankTransfer => "bank_transfer",
		Qris => "qris",
		Retail => "retail",
	}
}

text_enum! {
	/// Supported payment gateway providers.
	GatewayType {
		Midtrans => "midtrans",
		Xendit => "xendit",
		Doku => "doku",
		Nicepay => "nicepay",
		Faspay => "faspay",
	}
}

text_enum! {
	AdminFeeType {
		Fixed => "fixed",
		Percentage => "percentage",
	}
}

text_enum! {
	/// Audience of a voucher. Private and referral vouchers require an eligibility record.
	VoucherType {
		Public => "public",
		Private => "private",
		Referral => "referral",
		Cashback => "cashback",
	}
}

text_enum! {
	DiscountType {
		Fixed => "fixed",
		Percentage => "percentage",
	}
}

text_enum! {
	/// Lifecycle of a transaction. See [`crate::transaction`] for allowed transitions.
	TransactionStatus {
		Pending => "pending",
		AwaitingPayment => "awaiting_payment",
		Paid => "paid",
		Settlement => "settlement",
		Expired => "expired",
		Cancelled => "cancelled",
		Failed => "failed",
		Refunded => "refunded",
	}
}

text_enum! {
	/// Attribute of the checkout a voucher condition inspects.
	ConditionType {
		MinAmount => "min_amount",
		MaxAmount => "max_amount",
		ProductId => "product_id",
		CategoryId => "category_id",
		UserSegment => "user_segment",
		PaymentMethod => "payment_method",
	}
}

text_enum! {
	OperatorType {
		Equal => "equal",
		NotEqual => "not_equal",
		GreaterThan => "greater_than",
		LessThan => "less_than",
		In => "in",
		NotIn => "not_in",
	}
}

text_enum! {
	/// Actor responsible for a transaction status change.
	ChangedBy {
		System => "system",
		User => "user",
		Gateway => "gateway",
		Admin => "admin",
	}
}

text_enum! {
	RequestType {
		CreatePayment => "create_payment",
		CheckStatus => "check_status",
		CancelPayment => "cancel_payment",
		Refund => "refund",
	}
}

text_enum! {
	CallbackType {
		PaymentNotification => "payment_notification",
		TransactionStatus => "transaction_status",
		RefundNotification => "refund_notification",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_text_round_trip_for_every_status() {
		for status in TransactionStatus::ALL {
			assert_eq!(status.as_str().parse::<TransactionStatus>().unwrap(), *status);
		}
	}

	#[test]
	fn test_serde_uses_wire_names() {
		let json = serde_json::to_string(&MethodType::EWallet).unwrap();
		assert_eq!(json, "\"e_wallet\"");
		let parsed: GatewayType = serde_json::from_str("\"nicepay\"").unwrap();
		assert_eq!(parsed, GatewayType::Nicepay);
	}

	#[test]
	fn test_unknown_value_is_rejected() {
		let err = "bitcoin".parse::<MethodType>().unwrap_err();
		assert!(err.to_string().contains("MethodType"));
		assert!(err.to_string().contains("bitcoin"));
	}

	#[test]
	fn test_display_matches_as_str() {
		assert_eq!(ChangedBy::Gateway.to_string(), "gateway");
		assert_eq!(OperatorType::NotIn.to_string(), "not_in");
	}
}
