//! Outbound notifications for downstream collaborators (email, audit,
//! reporting). Publishing is synchronous bookkeeping; email dispatch is
//! fire-and-forget and must never roll a confirmation back.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use uuid::Uuid;

use crate::models::{Order, PaymentStatus, TicketInstance};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderConfirmed {
        order_id: Uuid,
        ticket_instance_ids: Vec<Uuid>,
    },
    PaymentStatusChanged {
        order_id: Uuid,
        payment_id: Uuid,
        status: PaymentStatus,
    },
}

pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &DomainEvent);
}

/// Default publisher: structured log lines that downstream consumers tail.
pub struct TracingPublisher;

impl EventPublisher for TracingPublisher {
    fn publish(&self, event: &DomainEvent) {
        match event {
            DomainEvent::OrderConfirmed {
                order_id,
                ticket_instance_ids,
            } => {
                tracing::info!(
                    order_id = %order_id,
                    tickets = ticket_instance_ids.len(),
                    "Order confirmed"
                );
            }
            DomainEvent::PaymentStatusChanged {
                order_id,
                payment_id,
                status,
            } => {
                tracing::info!(
                    order_id = %order_id,
                    payment_id = %payment_id,
                    status = status.as_str(),
                    "Payment status changed"
                );
            }
        }
    }
}

pub type MailFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

pub trait Mailer: Send + Sync {
    fn send_order_confirmation(&self, order: &Order, tickets: &[TicketInstance]) -> MailFuture;
}

/// Development mailer: logs instead of delivering.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_order_confirmation(&self, order: &Order, tickets: &[TicketInstance]) -> MailFuture {
        let order_id = order.id;
        let email = order.buyer_email.clone();
        let count = tickets.len();
        Box::pin(async move {
            tracing::info!(order_id = %order_id, to = %email, tickets = count, "Confirmation email dispatched");
            Ok(())
        })
    }
}
