use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A sellable category of admission within an event.
///
/// Counters obey `quantity_sold + quantity_reserved <= total_quantity` at all
/// times. The half-price sub-pool is a constrained subset of the same stock,
/// tracked with its own sold/reserved counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketType {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub total_quantity: i32,
    pub quantity_sold: i32,
    pub quantity_reserved: i32,
    pub half_price_quantity: Option<i32>,
    pub half_price_sold: i32,
    pub half_price_reserved: i32,
    pub min_per_order: i32,
    pub max_per_order: i32,
    pub sales_start: DateTime<Utc>,
    pub sales_end: DateTime<Utc>,
    pub visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketType {
    pub fn available(&self) -> i32 {
        self.total_quantity - self.quantity_sold - self.quantity_reserved
    }

    pub fn half_price_available(&self) -> i32 {
        self.half_price_quantity.unwrap_or(0) - self.half_price_sold - self.half_price_reserved
    }

    pub fn is_free(&self) -> bool {
        self.price.is_zero()
    }

    /// Unit price for one seat, halved (rounded half-up to the cent) for the
    /// half-price pool.
    pub fn unit_price(&self, half_price: bool) -> Decimal {
        if half_price {
            (self.price / Decimal::from(2))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        } else {
            self.price
        }
    }

    pub fn sales_open_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.sales_start && now < self.sales_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket_type(total: i32, sold: i32, reserved: i32) -> TicketType {
        let now = Utc::now();
        TicketType {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            name: "General".to_string(),
            description: None,
            price: Decimal::new(5000, 2),
            total_quantity: total,
            quantity_sold: sold,
            quantity_reserved: reserved,
            half_price_quantity: None,
            half_price_sold: 0,
            half_price_reserved: 0,
            min_per_order: 1,
            max_per_order: 10,
            sales_start: now - chrono::Duration::hours(1),
            sales_end: now + chrono::Duration::hours(1),
            visible: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn available_counts_reserved_against_stock() {
        let tt = ticket_type(10, 3, 4);
        assert_eq!(tt.available(), 3);
    }

    #[test]
    fn half_price_unit_rounds_to_cents() {
        let mut tt = ticket_type(10, 0, 0);
        tt.price = Decimal::new(3333, 2); // 33.33
        assert_eq!(tt.unit_price(true), Decimal::new(1667, 2));
        assert_eq!(tt.unit_price(false), Decimal::new(3333, 2));
    }

    #[test]
    fn sales_window_is_half_open() {
        let tt = ticket_type(10, 0, 0);
        assert!(tt.sales_open_at(tt.sales_start));
        assert!(!tt.sales_open_at(tt.sales_end));
    }
}
