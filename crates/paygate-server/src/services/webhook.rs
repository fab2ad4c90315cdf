// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Gateway webhook intake and processing.
//!
//! Every delivery is stored before anything else happens to it, so a payload
//! that fails signature checks or processing can be inspected and retried.

use chrono::{DateTime, Utc};
use paygate_common_webhook::verify_signature_header;
use paygate_core::{
	CallbackType, ChangedBy, GatewayCallback, GatewayNotification, PaymentGateway, Transaction,
	Transition,
};
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

use crate::api::Repositories;
use crate::error::{Result, ServerError};

/// One HTTP delivery as received.
#[derive(Debug, Clone)]
pub struct Delivery {
	pub body: Vec<u8>,
	pub signature: Option<String>,
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
}

/// Apply a stored callback to its transaction.
#[instrument(skip(repos, callback, gateway), fields(callback_id = %callback.id, gateway = %gateway.gateway_code))]
pub async fn process(
	repos: &Repositories,
	callback: &GatewayCallback,
	gateway: &PaymentGateway,
) -> Result<Transaction> {
	let notification = GatewayNotification::parse(gateway.gateway_type, &callback.raw_payload)?;
	let transaction = repos
		.transactions
		.get_by_invoice(&notification.invoice_number)
		.await?
		.ok_or_else(|| {
			ServerError::business_rule(format!(
				"no transaction for invoice {}",
				notification.invoice_number
			))
		})?;

	let notes = format!("{} reported {}", gateway.gateway_code, notification.gateway_status);
	let (mut transaction, transition) = repos
		.transactions
		.transition(
			&transaction.id,
			notification.status,
			ChangedBy::Gateway,
			Some(&callback.id),
			Some(&notes),
		)
		.await?;

	if let Some(reference) = notification.payment_reference.as_deref() {
		if transaction.payment_reference.as_deref() != Some(reference) {
			repos
				.transactions
				.set_payment_reference(&transaction.id, reference)
				.await?;
			transaction.payment_reference = Some(reference.to_string());
		}
	}

	if transition == Transition::Unchanged {
		tracing::debug!(transaction_id = %transaction.id, status = %transaction.status, "duplicate notification");
	}
	Ok(transaction)
}

/// Process a callback and record the outcome on it.
pub async fn settle(
	repos: &Repositories,
	callback: &GatewayCallback,
	gateway: &PaymentGateway,
) -> Result<Transaction> {
	match process(repos, callback, gateway).await {
		Ok(transaction) => {
			let notes = format!("applied: {}", transaction.status);
			repos
				.callbacks
				.mark_processed(&callback.id, Some(&transaction.id), Some(&notes))
				.await?;
			tracing::info!(
				callback_id = %callback.id,
				transaction_id = %transaction.id,
				status = %transaction.status,
				"callback processed"
			);
			Ok(transaction)
		}
		Err(e) => {
			repos.callbacks.record_failure(&callback.id, &e.to_string()).await?;
			tracing::warn!(callback_id = %callback.id, error = %e, "callback processing failed");
			Err(e)
		}
	}
}

/// Transaction a payload refers to, when it can be parsed at all.
async fn referenced_transaction(
	repos: &Repositories,
	gateway: &PaymentGateway,
	payload: &Value,
) -> Result<(Option<GatewayNotification>, Option<Transaction>)> {
	let notification = match GatewayNotification::parse(gateway.gateway_type, payload) {
		Ok(notification) => notification,
		Err(_) => return Ok((None, None)),
	};
	let transaction = repos
		.transactions
		.get_by_invoice(&notification.invoice_number)
		.await?;
	Ok((Some(notification), transaction))
}

async fn signature_is_valid(
	repos: &Repositories,
	gateway: &PaymentGateway,
	transaction: Option<&Transaction>,
	delivery: &Delivery,
) -> Result<bool> {
	let (Some(transaction), Some(signature)) = (transaction, delivery.signature.as_deref()) else {
		return Ok(false);
	};
	let secret = repos
		.payment_methods
		.get_active_credential(&gateway.id, &transaction.application_id)
		.await?
		.and_then(|c| c.webhook_secret);
	Ok(secret.is_some_and(|secret| {
		verify_signature_header(secret.as_bytes(), &delivery.body, signature)
	}))
}

/// Store a delivery, check its signature and apply it.
#[instrument(skip(repos, delivery), fields(body_len = delivery.body.len()))]
pub async fn receive(
	repos: &Repositories,
	gateway_code: &str,
	delivery: Delivery,
	require_signature: bool,
	now: DateTime<Utc>,
) -> Result<(GatewayCallback, Transaction)> {
	let gateway = repos
		.payment_methods
		.get_gateway_by_code(gateway_code)
		.await?
		.filter(|g| g.is_active)
		.ok_or_else(|| ServerError::not_found(format!("Gateway {gateway_code}")))?;

	let payload: Value = serde_json::from_slice(&delivery.body)
		.map_err(|e| ServerError::BadRequest(format!("malformed JSON payload: {e}")))?;

	let (notification, transaction) = referenced_transaction(repos, &gateway, &payload).await?;
	let is_signature_valid =
		signature_is_valid(repos, &gateway, transaction.as_ref(), &delivery).await?;

	let callback = GatewayCallback {
		id: Uuid::new_v4().to_string(),
		transaction_id: transaction.as_ref().map(|t| t.id.clone()),
		gateway_id: gateway.id.clone(),
		callback_type: notification
			.as_ref()
			.map(|n| n.callback_type)
			.unwrap_or(CallbackType::PaymentNotification),
		raw_payload: payload,
		signature: delivery.signature.clone(),
		is_signature_valid,
		is_processed: false,
		processed_at: None,
		attempts: 0,
		ip_address: delivery.ip_address.clone(),
		user_agent: delivery.user_agent.clone(),
		notes: None,
		created_at: now,
	};
	repos.callbacks.record(&callback).await?;
	tracing::info!(
		callback_id = %callback.id,
		gateway = %gateway.gateway_code,
		signature_valid = is_signature_valid,
		"callback stored"
	);

	if require_signature && !is_signature_valid {
		return Err(ServerError::InvalidSignature(
			"missing or invalid webhook signature".to_string(),
		));
	}

	let transaction = settle(repos, &callback, &gateway).await?;
	Ok((callback, transaction))
}

/// Re-run an unprocessed callback.
#[instrument(skip(repos))]
pub async fn retry(
	repos: &Repositories,
	callback_id: &str,
	require_signature: bool,
) -> Result<(GatewayCallback, Transaction)> {
	let callback = repos
		.callbacks
		.get(callback_id)
		.await?
		.ok_or_else(|| ServerError::not_found("Callback"))?;
	if callback.is_processed {
		return Err(ServerError::Conflict(format!(
			"callback {callback_id} is already processed"
		)));
	}
	if require_signature && !callback.is_signature_valid {
		return Err(ServerError::InvalidSignature(format!(
			"callback {callback_id} has no valid signature"
		)));
	}
	let gateway = repos
		.payment_methods
		.get_gateway(&callback.gateway_id)
		.await?
		.ok_or_else(|| ServerError::not_found("Gateway"))?;

	let transaction = settle(repos, &callback, &gateway).await?;
	Ok((callback, transaction))
}

#[cfg(test)]
mod tests {
	use super::*;
	use paygate_common_webhook::compute_signature;
	use paygate_core::TransactionStatus;
	use paygate_server_db::{testing, time};
	use serde_json::json;

	const SECRET: &str = "whsec_test";

	async fn setup() -> (Repositories, testing::CheckoutFixture, Transaction) {
		let pool = testing::create_test_pool().await;
		let f = testing::seed_checkout(&pool).await;
		let repos = Repositories::new(pool);
		repos
			.payment_methods
			.upsert_credential(&testing::credential(&f.application.id, &f.gateway.id, Some(SECRET)))
			.await
			.unwrap();
		let (trx, items) = testing::transaction(&f, 1);
		repos.transactions.create(&trx, &items, None).await.unwrap();
		(repos, f, trx)
	}

	fn delivery(payload: &Value, secret: Option<&str>) -> Delivery {
		let body = serde_json::to_vec(payload).unwrap();
		Delivery {
			signature: secret.map(|s| format!("sha256={}", compute_signature(s.as_bytes(), &body))),
			body,
			ip_address: Some("203.0.113.7".to_string()),
			user_agent: Some("Veritrans".to_string()),
		}
	}

	fn settlement(trx: &Transaction) -> Value {
		json!({
			"order_id": trx.invoice_number,
			"transaction_status": "settlement",
			"transaction_id": "mid-123",
		})
	}

	#[tokio::test]
	async fn test_signed_delivery_settles_transaction() {
		let (repos, _f, trx) = setup().await;
		let (callback, updated) = receive(
			&repos,
			"midtrans",
			delivery(&settlement(&trx), Some(SECRET)),
			true,
			time::now(),
		)
		.await
		.unwrap();

		assert_eq!(updated.status, TransactionStatus::Settlement);
		assert!(updated.paid_at.is_some());
		assert_eq!(updated.payment_reference.as_deref(), Some("mid-123"));

		let stored = repos.callbacks.get(&callback.id).await.unwrap().unwrap();
		assert!(stored.is_signature_valid);
		assert!(stored.is_processed);
		assert_eq!(stored.attempts, 1);
		assert_eq!(stored.transaction_id.as_deref(), Some(trx.id.as_str()));

		let logs = repos.transactions.logs(&trx.id).await.unwrap();
		let last = logs.last().unwrap();
		assert_eq!(last.changed_by, ChangedBy::Gateway);
		assert_eq!(last.gateway_callback_id.as_deref(), Some(callback.id.as_str()));
	}

	#[tokio::test]
	async fn test_bad_signature_is_stored_and_rejected() {
		let (repos, _f, trx) = setup().await;
		let err = receive(
			&repos,
			"midtrans",
			delivery(&settlement(&trx), Some("wrong-secret")),
			true,
			time::now(),
		)
		.await
		.unwrap_err();
		assert!(matches!(err, ServerError::InvalidSignature(_)));

		let unchanged = repos.transactions.get(&trx.id).await.unwrap().unwrap();
		assert_eq!(unchanged.status, TransactionStatus::Pending);

		let retryable = repos.callbacks.list_retryable(5, 10, true).await.unwrap();
		assert!(retryable.is_empty());
	}

	#[tokio::test]
	async fn test_unsigned_delivery_accepted_when_not_required() {
		let (repos, _f, trx) = setup().await;
		let (callback, updated) = receive(
			&repos,
			"midtrans",
			delivery(&settlement(&trx), None),
			false,
			time::now(),
		)
		.await
		.unwrap();
		assert_eq!(updated.status, TransactionStatus::Settlement);
		assert!(!callback.is_signature_valid);
	}

	#[tokio::test]
	async fn test_unknown_gateway_and_malformed_body() {
		let (repos, _f, trx) = setup().await;
		assert!(matches!(
			receive(&repos, "paypal", delivery(&settlement(&trx), None), false, time::now()).await,
			Err(ServerError::NotFound(_))
		));

		let garbage = Delivery {
			body: b"{not json".to_vec(),
			signature: None,
			ip_address: None,
			user_agent: None,
		};
		assert!(matches!(
			receive(&repos, "midtrans", garbage, false, time::now()).await,
			Err(ServerError::BadRequest(_))
		));
	}

	#[tokio::test]
	async fn test_unknown_invoice_fails_and_can_be_retried() {
		let (repos, _f, _trx) = setup().await;
		let payload = json!({"order_id": "INV/20250101/MISSING1", "transaction_status": "settlement"});
		let err = receive(&repos, "midtrans", delivery(&payload, None), false, time::now())
			.await
			.unwrap_err();
		assert!(matches!(err, ServerError::BusinessRule { .. }));

		let page = repos
			.callbacks
			.list(&paygate_server_db::ListQuery::default())
			.await
			.unwrap();
		let stored = &page.data[0];
		assert!(!stored.is_processed);
		assert_eq!(stored.attempts, 1);
		assert!(stored.notes.as_deref().unwrap().contains("INV/20250101/MISSING1"));

		assert!(matches!(
			retry(&repos, &stored.id, false).await,
			Err(ServerError::BusinessRule { .. })
		));
		assert!(matches!(
			retry(&repos, &stored.id, true).await,
			Err(ServerError::InvalidSignature(_))
		));
	}

	#[tokio::test]
	async fn test_retry_processes_pending_callback_once() {
		let (repos, f, trx) = setup().await;
		let callback = testing::callback(&f.gateway.id, settlement(&trx));
		repos.callbacks.record(&callback).await.unwrap();

		let (_, updated) = retry(&repos, &callback.id, true).await.unwrap();
		assert_eq!(updated.status, TransactionStatus::Settlement);

		assert!(matches!(
			retry(&repos, &callback.id, true).await,
			Err(ServerError::Conflict(_))
		));
		assert!(matches!(
			retry(&repos, "missing", true).await,
			Err(ServerError::NotFound(_))
		));
	}
}
