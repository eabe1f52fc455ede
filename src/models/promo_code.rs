use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountKind {
    Percentage,
    Fixed,
}

impl DiscountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscountKind::Percentage => "PERCENTAGE",
            DiscountKind::Fixed => "FIXED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PERCENTAGE" => Some(DiscountKind::Percentage),
            "FIXED" => Some(DiscountKind::Fixed),
            _ => None,
        }
    }
}

/// Discount rule scoped to one event. `current_uses` only ever increments,
/// and only when an order using the code is confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoCode {
    pub id: Uuid,
    pub event_id: Uuid,
    pub code: String,
    pub kind: DiscountKind,
    pub value: Decimal,
    pub max_uses: Option<i32>,
    pub max_uses_per_buyer: Option<i32>,
    pub current_uses: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub min_order_value: Option<Decimal>,
    pub max_discount: Option<Decimal>,
    pub ticket_type_ids: Option<Vec<Uuid>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
