//! Webhook reconciliation.
//!
//! Gateway notifications arrive late, repeated, and out of order. Every
//! delivery re-maps the provider state onto the payment and drives the order
//! through its machine behind atomic claims, so replays and concurrent
//! deliveries of the same logical event apply side effects at most once.
//! Installment plans notify once per installment against the same order; the
//! first accepted confirmation mints, the rest observe `AlreadyApplied`.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notify::{DomainEvent, EventPublisher};
use crate::gateway::{map_provider_status, PaymentGateway};
use crate::models::{OrderStatus, Payment, PaymentStatus};
use crate::repo::{OrderRepository, PaymentRepository};
use crate::services::inventory::InventoryLedger;
use crate::services::orders::OrderService;
use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEventType {
    #[serde(rename = "PAYMENT_CREATED")]
    PaymentCreated,
    #[serde(rename = "PAYMENT_UPDATED")]
    PaymentUpdated,
    #[serde(rename = "PAYMENT_CONFIRMED")]
    PaymentConfirmed,
    #[serde(rename = "PAYMENT_RECEIVED")]
    PaymentReceived,
    #[serde(rename = "PAYMENT_OVERDUE")]
    PaymentOverdue,
    #[serde(rename = "PAYMENT_REPROVED_BY_RISK_ANALYSIS")]
    PaymentReprovedByRisk,
    #[serde(rename = "PAYMENT_REFUNDED")]
    PaymentRefunded,
    #[serde(rename = "PAYMENT_CHARGEBACK_REQUESTED")]
    PaymentChargeback,
    /// Anything the provider adds later. Recorded, never fatal.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPaymentData {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub value: Option<Decimal>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Our order id, echoed back by the provider. Installment webhooks may
    /// carry distinct provider ids, so this is the fallback lookup key.
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub installment_number: Option<i32>,
    #[serde(default)]
    pub installment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event: WebhookEventType,
    pub payment: WebhookPaymentData,
}

/// What a delivery amounted to. Everything here is an HTTP 200; the provider
/// must not retry any of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookDisposition {
    Processed,
    AlreadyApplied,
    Recorded,
    Unmatched,
}

fn token_matches(expected: &str, provided: &str) -> bool {
    if expected.len() != provided.len() {
        return false;
    }
    expected
        .bytes()
        .zip(provided.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

pub struct WebhookReconciler {
    payments: Arc<dyn PaymentRepository>,
    orders: Arc<dyn OrderRepository>,
    order_service: Arc<OrderService>,
    ledger: Arc<InventoryLedger>,
    gateway: Arc<dyn PaymentGateway>,
    publisher: Arc<dyn EventPublisher>,
    webhook_token: Option<String>,
}

impl WebhookReconciler {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        orders: Arc<dyn OrderRepository>,
        order_service: Arc<OrderService>,
        ledger: Arc<InventoryLedger>,
        gateway: Arc<dyn PaymentGateway>,
        publisher: Arc<dyn EventPublisher>,
        webhook_token: Option<String>,
    ) -> Self {
        Self {
            payments,
            orders,
            order_service,
            ledger,
            gateway,
            publisher,
            webhook_token,
        }
    }

    /// Shared-secret check. Fails closed: with no token configured, every
    /// delivery is rejected rather than waved through.
    pub fn authorize(&self, provided: Option<&str>) -> Result<(), AppError> {
        match (&self.webhook_token, provided) {
            (Some(expected), Some(given)) if token_matches(expected, given) => Ok(()),
            (Some(_), _) => Err(AppError::AuthError("Invalid webhook token".to_string())),
            (None, _) => Err(AppError::AuthError(
                "Webhook token not configured; rejecting all deliveries".to_string(),
            )),
        }
    }

    pub async fn process(&self, payload: WebhookPayload) -> Result<WebhookDisposition, AppError> {
        let snapshot = serde_json::to_value(&payload).map_err(|e| {
            AppError::InternalServerError(format!("Unserializable webhook payload: {e}"))
        })?;

        let Some(payment) = self.locate_payment(&payload.payment).await? else {
            // The provider will not usefully retry a permanently unmatched
            // event, so acknowledge instead of erroring.
            tracing::warn!(
                provider_payment_id = %payload.payment.id,
                external_reference = payload.payment.external_reference.as_deref().unwrap_or("-"),
                "Webhook could not be matched to a payment; acknowledged"
            );
            return Ok(WebhookDisposition::Unmatched);
        };

        tracing::info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            event = ?payload.event,
            installment = payload.payment.installment_number.unwrap_or(0),
            "Processing payment webhook"
        );

        match payload.event {
            WebhookEventType::PaymentConfirmed | WebhookEventType::PaymentReceived => {
                self.apply_confirmation(&payment, &snapshot).await
            }
            WebhookEventType::PaymentOverdue | WebhookEventType::PaymentReprovedByRisk => {
                self.apply_failure(&payment, &snapshot).await
            }
            WebhookEventType::PaymentRefunded => {
                self.record_status(&payment, PaymentStatus::Refunded, &snapshot, true)
                    .await?;
                Ok(WebhookDisposition::Recorded)
            }
            WebhookEventType::PaymentChargeback => {
                self.record_status(&payment, PaymentStatus::Chargeback, &snapshot, true)
                    .await?;
                Ok(WebhookDisposition::Recorded)
            }
            WebhookEventType::PaymentCreated | WebhookEventType::PaymentUpdated => {
                let status = payload
                    .payment
                    .status
                    .as_deref()
                    .and_then(map_provider_status)
                    .unwrap_or(payment.status);
                self.record_status(&payment, status, &snapshot, false).await?;
                Ok(WebhookDisposition::Recorded)
            }
            WebhookEventType::Unknown => {
                tracing::info!(
                    payment_id = %payment.id,
                    "Unrecognized webhook event type recorded and ignored"
                );
                self.payments
                    .update_status(payment.id, payment.status, Some(&snapshot), None)
                    .await?;
                Ok(WebhookDisposition::Recorded)
            }
        }
    }

    /// Re-reads the provider's state for an order's payment and applies the
    /// same transitions a webhook would.
    pub async fn sync_order(&self, order_id: Uuid) -> Result<WebhookDisposition, AppError> {
        let payment = self
            .payments
            .find_active_by_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {order_id} has no payment")))?;

        let provider_view = self.gateway.get_payment(&payment.provider_payment_id).await?;
        let snapshot = serde_json::to_value(&provider_view).map_err(|e| {
            AppError::InternalServerError(format!("Unserializable gateway response: {e}"))
        })?;

        match map_provider_status(&provider_view.status) {
            Some(PaymentStatus::Completed) => self.apply_confirmation(&payment, &snapshot).await,
            Some(PaymentStatus::Failed) => self.apply_failure(&payment, &snapshot).await,
            Some(status) => {
                self.record_status(&payment, status, &snapshot, false).await?;
                Ok(WebhookDisposition::Recorded)
            }
            None => {
                tracing::warn!(
                    payment_id = %payment.id,
                    provider_status = %provider_view.status,
                    "Unrecognized provider status during sync; snapshot recorded"
                );
                self.payments
                    .update_status(payment.id, payment.status, Some(&snapshot), None)
                    .await?;
                Ok(WebhookDisposition::Recorded)
            }
        }
    }

    /// Provider transaction id first; order id (external reference) as the
    /// installment-plan fallback.
    async fn locate_payment(
        &self,
        data: &WebhookPaymentData,
    ) -> Result<Option<Payment>, AppError> {
        if let Some(payment) = self.payments.find_by_provider_id(&data.id).await? {
            return Ok(Some(payment));
        }
        if let Some(order_id) = data
            .external_reference
            .as_deref()
            .and_then(|r| Uuid::parse_str(r).ok())
        {
            return self.payments.find_active_by_order(order_id).await;
        }
        Ok(None)
    }

    async fn apply_confirmation(
        &self,
        payment: &Payment,
        snapshot: &serde_json::Value,
    ) -> Result<WebhookDisposition, AppError> {
        self.record_status(payment, PaymentStatus::Completed, snapshot, true)
            .await?;

        match self.order_service.confirm_order(payment.order_id).await? {
            Some(_tickets) => Ok(WebhookDisposition::Processed),
            None => Ok(WebhookDisposition::AlreadyApplied),
        }
    }

    async fn apply_failure(
        &self,
        payment: &Payment,
        snapshot: &serde_json::Value,
    ) -> Result<WebhookDisposition, AppError> {
        self.record_status(payment, PaymentStatus::Failed, snapshot, true)
            .await?;

        let claimed = self
            .orders
            .claim_transition(
                payment.order_id,
                &[OrderStatus::Pending, OrderStatus::Processing],
                OrderStatus::Cancelled,
            )
            .await?;
        if !claimed {
            return Ok(WebhookDisposition::AlreadyApplied);
        }

        let items = self.orders.items(payment.order_id).await?;
        self.ledger.release_items(&items).await?;
        tracing::info!(order_id = %payment.order_id, "Order cancelled after payment failure");
        Ok(WebhookDisposition::Processed)
    }

    async fn record_status(
        &self,
        payment: &Payment,
        status: PaymentStatus,
        snapshot: &serde_json::Value,
        processed: bool,
    ) -> Result<(), AppError> {
        let processed_at = processed.then(Utc::now);
        self.payments
            .update_status(payment.id, status, Some(snapshot), processed_at)
            .await?;
        if status != payment.status {
            self.publisher.publish(&DomainEvent::PaymentStatusChanged {
                order_id: payment.order_id,
                payment_id: payment.id,
                status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_comparison_is_exact() {
        assert!(token_matches("secret-token", "secret-token"));
        assert!(!token_matches("secret-token", "secret-tokem"));
        assert!(!token_matches("secret-token", "secret"));
        assert!(!token_matches("", "x"));
    }

    #[test]
    fn unknown_event_types_deserialize_as_unknown() {
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({
            "event": "PAYMENT_SPLIT_DIVERGENCE_BLOCK",
            "payment": { "id": "pay_123", "status": "PENDING" }
        }))
        .unwrap();
        assert_eq!(payload.event, WebhookEventType::Unknown);
        assert_eq!(payload.payment.id, "pay_123");
    }

    #[test]
    fn installment_fields_are_optional() {
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({
            "event": "PAYMENT_RECEIVED",
            "payment": {
                "id": "pay_9",
                "installmentNumber": 2,
                "externalReference": "8b4f0f3e-8a86-4f8e-9f37-5cda7d1a6c02"
            }
        }))
        .unwrap();
        assert_eq!(payload.payment.installment_number, Some(2));
        assert!(payload.payment.external_reference.is_some());
    }
}
