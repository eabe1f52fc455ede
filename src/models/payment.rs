use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
    Chargeback,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::Chargeback => "CHARGEBACK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "PROCESSING" => Some(PaymentStatus::Processing),
            "COMPLETED" => Some(PaymentStatus::Completed),
            "FAILED" => Some(PaymentStatus::Failed),
            "CANCELLED" => Some(PaymentStatus::Cancelled),
            "REFUNDED" => Some(PaymentStatus::Refunded),
            "CHARGEBACK" => Some(PaymentStatus::Chargeback),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingMethod {
    Pix,
    Boleto,
    Card,
}

impl BillingMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            BillingMethod::Pix => "PIX",
            BillingMethod::Boleto => "BOLETO",
            BillingMethod::Card => "CARD",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PIX" => Some(BillingMethod::Pix),
            "BOLETO" => Some(BillingMethod::Boleto),
            "CARD" => Some(BillingMethod::Card),
            _ => None,
        }
    }
}

/// One gateway transaction tied to exactly one order. At most one
/// non-cancelled payment exists per order. The raw provider response is kept
/// verbatim for reconciliation and support.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: Decimal,
    pub method: BillingMethod,
    pub installments: Option<i32>,
    pub provider: String,
    pub provider_payment_id: String,
    pub provider_snapshot: serde_json::Value,
    pub status: PaymentStatus,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
