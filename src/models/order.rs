use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order lifecycle. Transitions are one-directional; `Cancelled` and
/// `Expired` are alternate terminals reachable while payment is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Processing,
    Confirmed,
    Completed,
    Cancelled,
    Expired,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "PROCESSING" => Some(OrderStatus::Processing),
            "CONFIRMED" => Some(OrderStatus::Confirmed),
            "COMPLETED" => Some(OrderStatus::Completed),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            "EXPIRED" => Some(OrderStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Expired
        )
    }

    pub fn can_transition(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Pending, Expired)
                | (Processing, Confirmed)
                | (Processing, Cancelled)
                | (Processing, Expired)
                | (Confirmed, Completed)
        )
    }
}

/// Per-seat identity supplied at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendee {
    pub name: String,
    pub email: Option<String>,
    pub cpf: Option<String>,
}

/// One buyer's purchase against one event.
///
/// The buyer fields are a snapshot captured at order time and never follow
/// later profile changes. `total = subtotal - discount + service_fee`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub event_id: Uuid,
    pub buyer_id: Uuid,
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_cpf: String,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub service_fee: Decimal,
    pub total: Decimal,
    pub promo_code_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub email_sent: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub email_last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line within an order. Immutable once the order is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub ticket_type_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub half_price: bool,
    pub attendees: Vec<Attendee>,
}
