//! Payment-provider boundary.
//!
//! The core never talks wire formats; it depends on this request/response
//! contract. Real provider adapters live outside the crate and implement
//! [`PaymentGateway`]; [`mock::MockPaymentGateway`] backs development and
//! the test suites.

use std::future::Future;
use std::pin::Pin;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::payment::{BillingMethod, PaymentStatus};
use crate::utils::error::AppError;

pub mod mock;

pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, GatewayError>> + Send + 'a>>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("Provider rejected the request: {0}")]
    Rejected(String),
    #[error("Provider unreachable: {0}")]
    Unreachable(String),
    #[error("Provider returned an unexpected response: {0}")]
    Malformed(String),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::GatewayError(err.to_string())
    }
}

/// One recipient of a payment split, taking `percentage` of the proceeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitRecipient {
    pub wallet_id: String,
    pub percentage: Decimal,
}

/// Split percentages must not exceed the whole payment.
pub fn validate_split(split: &[SplitRecipient]) -> Result<(), AppError> {
    let mut sum = Decimal::ZERO;
    for recipient in split {
        if recipient.percentage <= Decimal::ZERO {
            return Err(AppError::ValidationError(format!(
                "Split percentage for wallet {} must be positive",
                recipient.wallet_id
            )));
        }
        sum += recipient.percentage;
    }
    if sum > Decimal::from(100) {
        return Err(AppError::ValidationError(format!(
            "Split percentages sum to {sum}, exceeding 100"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub email: String,
    pub cpf: String,
}

#[derive(Debug, Clone)]
pub struct CreatePaymentRequest {
    pub customer_id: String,
    pub amount: Decimal,
    pub method: BillingMethod,
    pub due_date: Option<NaiveDate>,
    pub description: String,
    /// Our order id, echoed back by the provider on every webhook.
    pub external_reference: String,
    pub split: Vec<SplitRecipient>,
    pub installments: Option<i32>,
}

/// Provider's view of a payment, as returned by create/get.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayPayment {
    pub id: String,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub pix_payload: Option<String>,
    pub boleto_url: Option<String>,
}

pub trait PaymentGateway: Send + Sync {
    /// Recorded on every payment row so reconciliation knows which adapter
    /// produced the provider ids.
    fn provider_name(&self) -> &'static str;

    fn create_customer(&self, request: CreateCustomerRequest) -> GatewayFuture<'_, String>;
    fn create_payment(&self, request: CreatePaymentRequest) -> GatewayFuture<'_, GatewayPayment>;
    fn get_payment(&self, provider_payment_id: &str) -> GatewayFuture<'_, GatewayPayment>;
    fn cancel_payment(&self, provider_payment_id: &str) -> GatewayFuture<'_, ()>;
}

/// Maps a provider payment status onto our closed enum. Returns `None` for
/// statuses we do not recognize; callers record those and move on.
pub fn map_provider_status(status: &str) -> Option<PaymentStatus> {
    match status {
        "PENDING" | "AWAITING_PAYMENT" => Some(PaymentStatus::Pending),
        "AWAITING_RISK_ANALYSIS" => Some(PaymentStatus::Processing),
        "CONFIRMED" | "RECEIVED" | "RECEIVED_IN_CASH" => Some(PaymentStatus::Completed),
        "OVERDUE" | "REPROVED_BY_RISK_ANALYSIS" => Some(PaymentStatus::Failed),
        "REFUNDED" | "REFUND_REQUESTED" => Some(PaymentStatus::Refunded),
        "CHARGEBACK_REQUESTED" | "CHARGEBACK_DISPUTE" => Some(PaymentStatus::Chargeback),
        "CANCELLED" | "DELETED" => Some(PaymentStatus::Cancelled),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient(pct: i64) -> SplitRecipient {
        SplitRecipient {
            wallet_id: format!("wal_{pct}"),
            percentage: Decimal::from(pct),
        }
    }

    #[test]
    fn split_must_not_exceed_hundred() {
        assert!(validate_split(&[recipient(60), recipient(40)]).is_ok());
        assert!(validate_split(&[recipient(60), recipient(41)]).is_err());
        assert!(validate_split(&[]).is_ok());
    }

    #[test]
    fn split_rejects_non_positive_shares() {
        assert!(validate_split(&[recipient(0)]).is_err());
    }

    #[test]
    fn unknown_provider_status_maps_to_none() {
        assert_eq!(map_provider_status("SOMETHING_NEW"), None);
        assert_eq!(map_provider_status("RECEIVED"), Some(PaymentStatus::Completed));
    }
}
