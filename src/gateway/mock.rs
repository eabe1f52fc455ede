//! Deterministic gateway used by tests and local development.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::gateway::{
    CreateCustomerRequest, CreatePaymentRequest, GatewayError, GatewayFuture, GatewayPayment,
    PaymentGateway,
};
use crate::models::payment::BillingMethod;

/// Always-succeeding gateway. Every created payment starts `PENDING` and
/// carries the method-appropriate artifact (pix payload or boleto url).
/// `fail_next` flips the next call into a provider outage, which is how the
/// tests exercise the retryable-failure path.
#[derive(Default)]
pub struct MockPaymentGateway {
    fail_next: AtomicBool,
    cancelled: Mutex<Vec<String>>,
    payment_status: Mutex<Vec<(String, String)>>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_call(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Overrides what `get_payment` reports for one provider payment id.
    pub fn set_payment_status(&self, provider_payment_id: &str, status: &str) {
        self.payment_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((provider_payment_id.to_string(), status.to_string()));
    }

    pub fn cancelled_payments(&self) -> Vec<String> {
        self.cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn take_failure(&self) -> bool {
        self.fail_next.swap(false, Ordering::SeqCst)
    }
}

impl PaymentGateway for MockPaymentGateway {
    fn provider_name(&self) -> &'static str {
        "mock-gateway"
    }

    fn create_customer(&self, request: CreateCustomerRequest) -> GatewayFuture<'_, String> {
        let fail = self.take_failure();
        Box::pin(async move {
            if fail {
                return Err(GatewayError::Unreachable("mock outage".to_string()));
            }
            tracing::debug!(email = %request.email, "Mock customer created");
            Ok(format!("cus_{}", Uuid::new_v4().simple()))
        })
    }

    fn create_payment(&self, request: CreatePaymentRequest) -> GatewayFuture<'_, GatewayPayment> {
        let fail = self.take_failure();
        Box::pin(async move {
            if fail {
                return Err(GatewayError::Unreachable("mock outage".to_string()));
            }
            let id = format!("pay_{}", Uuid::new_v4().simple());
            tracing::debug!(
                provider_payment_id = %id,
                amount = %request.amount,
                external_reference = %request.external_reference,
                "Mock payment created"
            );
            Ok(GatewayPayment {
                id,
                status: "PENDING".to_string(),
                due_date: request
                    .due_date
                    .or_else(|| Some((Utc::now() + Duration::days(3)).date_naive())),
                pix_payload: matches!(request.method, BillingMethod::Pix)
                    .then(|| format!("00020126PIX{}", Uuid::new_v4().simple())),
                boleto_url: matches!(request.method, BillingMethod::Boleto)
                    .then(|| format!("https://mock.gateway/boleto/{}", Uuid::new_v4().simple())),
            })
        })
    }

    fn get_payment(&self, provider_payment_id: &str) -> GatewayFuture<'_, GatewayPayment> {
        let fail = self.take_failure();
        let id = provider_payment_id.to_string();
        Box::pin(async move {
            if fail {
                return Err(GatewayError::Unreachable("mock outage".to_string()));
            }
            let status = self
                .payment_status
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .rev()
                .find(|(payment, _)| *payment == id)
                .map(|(_, status)| status.clone())
                .unwrap_or_else(|| "PENDING".to_string());
            Ok(GatewayPayment {
                id,
                status,
                due_date: None,
                pix_payload: None,
                boleto_url: None,
            })
        })
    }

    fn cancel_payment(&self, provider_payment_id: &str) -> GatewayFuture<'_, ()> {
        let fail = self.take_failure();
        let id = provider_payment_id.to_string();
        Box::pin(async move {
            if fail {
                return Err(GatewayError::Unreachable("mock outage".to_string()));
            }
            self.cancelled
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn payment_request(method: BillingMethod) -> CreatePaymentRequest {
        CreatePaymentRequest {
            customer_id: "cus_1".to_string(),
            amount: Decimal::new(12000, 2),
            method,
            due_date: None,
            description: "Tickets".to_string(),
            external_reference: Uuid::new_v4().to_string(),
            split: vec![],
            installments: None,
        }
    }

    #[tokio::test]
    async fn pix_payments_carry_a_payload() {
        let gateway = MockPaymentGateway::new();
        let payment = gateway
            .create_payment(payment_request(BillingMethod::Pix))
            .await
            .unwrap();
        assert!(payment.pix_payload.is_some());
        assert!(payment.boleto_url.is_none());
    }

    #[tokio::test]
    async fn fail_next_call_fails_exactly_once() {
        let gateway = MockPaymentGateway::new();
        gateway.fail_next_call();
        assert!(gateway
            .create_payment(payment_request(BillingMethod::Boleto))
            .await
            .is_err());
        assert!(gateway
            .create_payment(payment_request(BillingMethod::Boleto))
            .await
            .is_ok());
    }
}
