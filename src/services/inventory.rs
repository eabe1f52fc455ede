//! Inventory ledger: reservation, commit, and release of ticket-type stock.
//!
//! Reservation exists to cover the gap between checkout and the gateway's
//! asynchronous verdict, which can span minutes (pix) to days (boleto).
//! Stock checks and counter increments are a single atomic repository
//! operation; this service layers the sales-window and per-order rules on
//! top and translates rejections into the API error taxonomy.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{OrderItem, TicketType};
use crate::repo::TicketTypeRepository;
use crate::utils::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReservationError {
    #[error("Sales have not started for this ticket type")]
    SalesNotStarted,
    #[error("Sales have ended for this ticket type")]
    SalesEnded,
    #[error("Ticket type not found")]
    NotVisible,
    #[error("Quantity is below the minimum of {0} per order")]
    BelowMinimum(i32),
    #[error("Quantity is above the maximum of {0} per order")]
    AboveMaximum(i32),
    #[error("This ticket type has no half-price allocation")]
    HalfPriceUnavailable,
    #[error("Insufficient stock")]
    InsufficientStock,
}

impl From<ReservationError> for AppError {
    fn from(err: ReservationError) -> Self {
        match err {
            ReservationError::InsufficientStock => AppError::Conflict(err.to_string()),
            ReservationError::NotVisible => AppError::NotFound(err.to_string()),
            _ => AppError::ValidationError(err.to_string()),
        }
    }
}

/// A hold on stock, tied to the order being checked out.
#[derive(Debug, Clone)]
pub struct ReservedLine {
    pub ticket_type_id: Uuid,
    pub quantity: i32,
    pub half_quantity: i32,
}

impl ReservedLine {
    pub fn from_item(item: &OrderItem) -> Self {
        Self {
            ticket_type_id: item.ticket_type_id,
            quantity: item.quantity,
            half_quantity: if item.half_price { item.quantity } else { 0 },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Availability {
    pub ticket_type_id: Uuid,
    pub available: i32,
    pub half_price_available: i32,
    pub sales_open: bool,
}

/// Pre-reservation rules that do not touch counters. Stock itself is checked
/// atomically at increment time, not here.
fn validate_request(
    ticket_type: &TicketType,
    quantity: i32,
    half_price: bool,
    public_request: bool,
    now: DateTime<Utc>,
) -> Result<(), ReservationError> {
    if public_request && !ticket_type.visible {
        return Err(ReservationError::NotVisible);
    }
    if now < ticket_type.sales_start {
        return Err(ReservationError::SalesNotStarted);
    }
    if now >= ticket_type.sales_end {
        return Err(ReservationError::SalesEnded);
    }
    if quantity < ticket_type.min_per_order {
        return Err(ReservationError::BelowMinimum(ticket_type.min_per_order));
    }
    if quantity > ticket_type.max_per_order {
        return Err(ReservationError::AboveMaximum(ticket_type.max_per_order));
    }
    if half_price && ticket_type.half_price_quantity.is_none() {
        return Err(ReservationError::HalfPriceUnavailable);
    }
    Ok(())
}

pub struct InventoryLedger {
    ticket_types: Arc<dyn TicketTypeRepository>,
}

impl InventoryLedger {
    pub fn new(ticket_types: Arc<dyn TicketTypeRepository>) -> Self {
        Self { ticket_types }
    }

    /// Places a hold on `quantity` seats. Returns the loaded ticket type
    /// alongside the hold so checkout can price the line without a second
    /// read.
    pub async fn reserve(
        &self,
        ticket_type_id: Uuid,
        quantity: i32,
        half_price: bool,
        public_request: bool,
    ) -> Result<(TicketType, ReservedLine), AppError> {
        if quantity <= 0 {
            return Err(AppError::ValidationError(
                "Quantity must be positive".to_string(),
            ));
        }

        let ticket_type = self
            .ticket_types
            .find(ticket_type_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket type {ticket_type_id} not found")))?;

        validate_request(&ticket_type, quantity, half_price, public_request, Utc::now())?;

        let half_quantity = if half_price { quantity } else { 0 };
        let reserved = self
            .ticket_types
            .try_reserve(ticket_type_id, quantity, half_quantity)
            .await?;
        if !reserved {
            return Err(ReservationError::InsufficientStock.into());
        }

        Ok((
            ticket_type,
            ReservedLine {
                ticket_type_id,
                quantity,
                half_quantity,
            },
        ))
    }

    /// Converts held stock to sold for every line of a confirmed order.
    pub async fn commit_items(&self, items: &[OrderItem]) -> Result<(), AppError> {
        for line in items.iter().map(ReservedLine::from_item) {
            self.ticket_types
                .commit_reserved(line.ticket_type_id, line.quantity, line.half_quantity)
                .await?;
        }
        Ok(())
    }

    /// Returns held stock to the pool. Attempts every line even when one
    /// fails, then reports the first failure.
    pub async fn release_lines(&self, lines: &[ReservedLine]) -> Result<(), AppError> {
        let mut first_error = None;
        for line in lines {
            if let Err(err) = self
                .ticket_types
                .release_reserved(line.ticket_type_id, line.quantity, line.half_quantity)
                .await
            {
                tracing::error!(
                    ticket_type_id = %line.ticket_type_id,
                    error = %err,
                    "Failed to release reservation"
                );
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub async fn release_items(&self, items: &[OrderItem]) -> Result<(), AppError> {
        let lines: Vec<ReservedLine> = items.iter().map(ReservedLine::from_item).collect();
        self.release_lines(&lines).await
    }

    pub async fn availability(&self, ticket_type_id: Uuid) -> Result<Availability, AppError> {
        let ticket_type = self
            .ticket_types
            .find(ticket_type_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket type {ticket_type_id} not found")))?;
        Ok(Availability {
            ticket_type_id,
            available: ticket_type.available(),
            half_price_available: ticket_type.half_price_available().max(0),
            sales_open: ticket_type.sales_open_at(Utc::now()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn ticket_type() -> TicketType {
        let now = Utc::now();
        TicketType {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            name: "Pista".to_string(),
            description: None,
            price: Decimal::new(10000, 2),
            total_quantity: 100,
            quantity_sold: 0,
            quantity_reserved: 0,
            half_price_quantity: Some(20),
            half_price_sold: 0,
            half_price_reserved: 0,
            min_per_order: 2,
            max_per_order: 6,
            sales_start: now - chrono::Duration::days(1),
            sales_end: now + chrono::Duration::days(1),
            visible: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn rejects_outside_the_sales_window() {
        let tt = ticket_type();
        let before = tt.sales_start - chrono::Duration::seconds(1);
        let after = tt.sales_end;
        assert_eq!(
            validate_request(&tt, 2, false, true, before),
            Err(ReservationError::SalesNotStarted)
        );
        assert_eq!(
            validate_request(&tt, 2, false, true, after),
            Err(ReservationError::SalesEnded)
        );
    }

    #[test]
    fn hidden_types_reject_public_requests_only() {
        let mut tt = ticket_type();
        tt.visible = false;
        let now = Utc::now();
        assert_eq!(
            validate_request(&tt, 2, false, true, now),
            Err(ReservationError::NotVisible)
        );
        assert!(validate_request(&tt, 2, false, false, now).is_ok());
    }

    #[test]
    fn enforces_per_order_limits() {
        let tt = ticket_type();
        let now = Utc::now();
        assert_eq!(
            validate_request(&tt, 1, false, true, now),
            Err(ReservationError::BelowMinimum(2))
        );
        assert_eq!(
            validate_request(&tt, 7, false, true, now),
            Err(ReservationError::AboveMaximum(6))
        );
        assert!(validate_request(&tt, 6, false, true, now).is_ok());
    }

    #[test]
    fn half_price_requires_an_allocation() {
        let mut tt = ticket_type();
        tt.half_price_quantity = None;
        assert_eq!(
            validate_request(&tt, 2, true, true, Utc::now()),
            Err(ReservationError::HalfPriceUnavailable)
        );
    }
}
