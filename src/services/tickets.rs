//! Ticket instance minting and redemption.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{Attendee, Order, OrderItem, TicketInstance, TicketStatus};
use crate::repo::TicketInstanceRepository;
use crate::utils::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct CheckInRequest {
    pub code: String,
    pub operator_id: Uuid,
    pub location: Option<String>,
    pub notes: Option<String>,
}

/// Builds the instances for a confirmed order: one per supplied attendee,
/// or `quantity` anonymous seats when the buyer skipped per-seat data.
fn build_instances(order: &Order, items: &[OrderItem]) -> Vec<TicketInstance> {
    let now = Utc::now();
    let mut instances = Vec::new();
    for item in items {
        let seats = if item.attendees.is_empty() {
            (0..item.quantity).map(|_| None).collect::<Vec<_>>()
        } else {
            item.attendees.iter().map(|a| Some(a.clone())).collect()
        };
        for attendee in seats {
            instances.push(TicketInstance {
                id: Uuid::new_v4(),
                order_id: order.id,
                order_item_id: item.id,
                ticket_type_id: item.ticket_type_id,
                code: TicketInstance::generate_code(),
                attendee_name: attendee.as_ref().map(|a| a.name.clone()),
                attendee_email: attendee.as_ref().and_then(|a| a.email.clone()),
                attendee_cpf: attendee.as_ref().and_then(|a| a.cpf.clone()),
                status: TicketStatus::Active,
                checked_in_at: None,
                checked_in_by: None,
                check_in_location: None,
                check_in_notes: None,
                transferred_from: None,
                transferred_at: None,
                created_at: now,
                updated_at: now,
            });
        }
    }
    instances
}

pub struct TicketService {
    tickets: Arc<dyn TicketInstanceRepository>,
}

impl TicketService {
    pub fn new(tickets: Arc<dyn TicketInstanceRepository>) -> Self {
        Self { tickets }
    }

    /// Mints one redeemable instance per purchased seat, exactly once.
    /// A replay for an order that already has instances returns the
    /// existing set untouched.
    pub async fn mint_for_order(
        &self,
        order: &Order,
        items: &[OrderItem],
    ) -> Result<Vec<TicketInstance>, AppError> {
        if self.tickets.exists_for_order(order.id).await? {
            return self.tickets.list_by_order(order.id).await;
        }
        let instances = build_instances(order, items);
        self.tickets.insert_all(&instances).await?;
        tracing::info!(order_id = %order.id, minted = instances.len(), "Ticket instances minted");
        Ok(instances)
    }

    /// Rolls freshly minted instances back when a later step of the
    /// confirmation fails.
    pub async fn void_for_order(&self, order_id: Uuid) -> Result<(), AppError> {
        self.tickets.cancel_all_for_order(order_id).await
    }

    pub async fn list_for_order(&self, order_id: Uuid) -> Result<Vec<TicketInstance>, AppError> {
        self.tickets.list_by_order(order_id).await
    }

    pub async fn check_in(&self, request: &CheckInRequest) -> Result<TicketInstance, AppError> {
        let ticket = self
            .tickets
            .find_by_code(&request.code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", request.code)))?;

        let now = Utc::now();
        let won = self
            .tickets
            .check_in(
                ticket.id,
                request.operator_id,
                request.location.as_deref(),
                request.notes.as_deref(),
                now,
            )
            .await?;
        if !won {
            return Err(self.redemption_conflict(ticket.id, "checked in").await?);
        }

        self.tickets
            .find(ticket.id)
            .await?
            .ok_or_else(|| AppError::InternalServerError("Ticket vanished during check-in".to_string()))
    }

    /// Reassigns the attendee while the ticket is still unredeemed. Records
    /// the prior holder; the status does not change.
    pub async fn transfer(&self, id: Uuid, attendee: &Attendee) -> Result<TicketInstance, AppError> {
        let ticket = self
            .tickets
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket instance {id} not found")))?;

        let previous_holder = ticket
            .attendee_name
            .clone()
            .or_else(|| ticket.attendee_email.clone())
            .unwrap_or_else(|| "unassigned".to_string());

        let won = self
            .tickets
            .transfer(id, attendee, &previous_holder, Utc::now())
            .await?;
        if !won {
            return Err(self.redemption_conflict(id, "transferred").await?);
        }

        self.tickets
            .find(id)
            .await?
            .ok_or_else(|| AppError::InternalServerError("Ticket vanished during transfer".to_string()))
    }

    pub async fn cancel(&self, id: Uuid) -> Result<TicketInstance, AppError> {
        let won = self.tickets.cancel(id).await?;
        if !won {
            return Err(self.redemption_conflict(id, "cancelled").await?);
        }
        self.tickets
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket instance {id} not found")))
    }

    /// Explains a lost status race by re-reading the current state.
    async fn redemption_conflict(&self, id: Uuid, action: &str) -> Result<AppError, AppError> {
        let current = self
            .tickets
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket instance {id} not found")))?;
        Ok(match current.status {
            TicketStatus::CheckedIn => {
                AppError::Conflict("Ticket has already been checked in".to_string())
            }
            TicketStatus::Cancelled => AppError::Conflict("Ticket has been cancelled".to_string()),
            TicketStatus::Active => {
                AppError::Conflict(format!("Ticket could not be {action}, please retry"))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn order() -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            buyer_id: Uuid::new_v4(),
            buyer_name: "Ana Souza".to_string(),
            buyer_email: "ana@example.com".to_string(),
            buyer_cpf: "12345678901".to_string(),
            status: crate::models::OrderStatus::Confirmed,
            subtotal: Decimal::from(100),
            discount: Decimal::ZERO,
            service_fee: Decimal::from(10),
            total: Decimal::from(110),
            promo_code_id: None,
            payment_id: None,
            email_sent: false,
            email_sent_at: None,
            email_last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(order_id: Uuid, quantity: i32, attendees: Vec<Attendee>) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4(),
            order_id,
            ticket_type_id: Uuid::new_v4(),
            quantity,
            unit_price: Decimal::from(50),
            half_price: false,
            attendees,
        }
    }

    #[test]
    fn anonymous_items_mint_quantity_instances() {
        let order = order();
        let items = vec![item(order.id, 3, vec![])];
        let instances = build_instances(&order, &items);
        assert_eq!(instances.len(), 3);
        assert!(instances.iter().all(|t| t.attendee_name.is_none()));
    }

    #[test]
    fn named_items_mint_one_instance_per_attendee() {
        let order = order();
        let attendees = vec![
            Attendee {
                name: "Bruno Lima".to_string(),
                email: Some("bruno@example.com".to_string()),
                cpf: None,
            },
            Attendee {
                name: "Clara Dias".to_string(),
                email: None,
                cpf: Some("98765432100".to_string()),
            },
        ];
        let items = vec![item(order.id, 2, attendees)];
        let instances = build_instances(&order, &items);
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].attendee_name.as_deref(), Some("Bruno Lima"));
        assert_eq!(instances[1].attendee_cpf.as_deref(), Some("98765432100"));
    }

    #[test]
    fn every_minted_code_is_distinct() {
        let order = order();
        let items = vec![item(order.id, 5, vec![]), item(order.id, 5, vec![])];
        let instances = build_instances(&order, &items);
        let mut codes: Vec<&str> = instances.iter().map(|t| t.code.as_str()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 10);
    }
}
