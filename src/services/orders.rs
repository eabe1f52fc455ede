//! Checkout and the order state machine.
//!
//! Free orders confirm synchronously at creation. Paid orders hold their
//! reservation through the gateway round-trip and are resolved later by the
//! webhook reconciler (or an explicit sync). Confirmation side effects run
//! behind an atomic status claim so replays and concurrent deliveries apply
//! them at most once.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notify::{DomainEvent, EventPublisher, Mailer};
use crate::gateway::{
    map_provider_status, validate_split, CreateCustomerRequest, CreatePaymentRequest,
    GatewayPayment, PaymentGateway, SplitRecipient,
};
use crate::models::{
    Attendee, BillingMethod, Order, OrderItem, OrderStatus, Payment, PaymentStatus, TicketInstance,
};
use crate::repo::{OrderRepository, PaymentRepository, PromoCodeRepository};
use crate::services::inventory::{InventoryLedger, ReservedLine};
use crate::services::promo::PromoService;
use crate::services::tickets::TicketService;
use crate::utils::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct BuyerInfo {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub cpf: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutItem {
    pub ticket_type_id: Uuid,
    pub quantity: i32,
    #[serde(default)]
    pub half_price: bool,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingInfo {
    pub method: BillingMethod,
    pub installments: Option<i32>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutCommand {
    pub event_id: Uuid,
    pub buyer: BuyerInfo,
    pub items: Vec<CheckoutItem>,
    pub promo_code: Option<String>,
    pub billing: Option<BillingInfo>,
    #[serde(default)]
    pub split: Vec<SplitRecipient>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub payment: Option<Payment>,
    /// Provider artifacts the buyer needs to pay (pix payload, boleto url).
    pub instructions: Option<GatewayPayment>,
    /// Instances minted synchronously; empty until a paid order confirms.
    pub tickets: Vec<TicketInstance>,
}

#[derive(Debug, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub tickets: Vec<TicketInstance>,
}

pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
    promo_codes: Arc<dyn PromoCodeRepository>,
    ledger: Arc<InventoryLedger>,
    tickets: Arc<TicketService>,
    promos: Arc<PromoService>,
    gateway: Arc<dyn PaymentGateway>,
    publisher: Arc<dyn EventPublisher>,
    mailer: Arc<dyn Mailer>,
    service_fee_percent: Decimal,
}

impl OrderService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentRepository>,
        promo_codes: Arc<dyn PromoCodeRepository>,
        ledger: Arc<InventoryLedger>,
        tickets: Arc<TicketService>,
        promos: Arc<PromoService>,
        gateway: Arc<dyn PaymentGateway>,
        publisher: Arc<dyn EventPublisher>,
        mailer: Arc<dyn Mailer>,
        service_fee_percent: Decimal,
    ) -> Self {
        Self {
            orders,
            payments,
            promo_codes,
            ledger,
            tickets,
            promos,
            gateway,
            publisher,
            mailer,
            service_fee_percent,
        }
    }

    fn service_fee(&self, discounted_subtotal: Decimal) -> Decimal {
        if discounted_subtotal.is_zero() {
            return Decimal::ZERO;
        }
        (discounted_subtotal * self.service_fee_percent / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    pub async fn checkout(
        &self,
        cmd: CheckoutCommand,
        public_request: bool,
    ) -> Result<CheckoutOutcome, AppError> {
        if cmd.items.is_empty() {
            return Err(AppError::ValidationError(
                "Order must contain at least one item".to_string(),
            ));
        }
        for item in &cmd.items {
            if !item.attendees.is_empty() && item.attendees.len() != item.quantity as usize {
                return Err(AppError::ValidationError(format!(
                    "Ticket type {}: {} attendees supplied for {} seats",
                    item.ticket_type_id,
                    item.attendees.len(),
                    item.quantity
                )));
            }
        }
        validate_split(&cmd.split)?;

        // Hold stock line by line; unwind every hold on the first rejection
        // so a failed checkout leaves no partial reservation behind.
        let order_id = Uuid::new_v4();
        let mut reserved: Vec<ReservedLine> = Vec::new();
        let mut items: Vec<OrderItem> = Vec::new();
        for item in &cmd.items {
            match self
                .ledger
                .reserve(item.ticket_type_id, item.quantity, item.half_price, public_request)
                .await
            {
                Ok((ticket_type, line)) => {
                    items.push(OrderItem {
                        id: Uuid::new_v4(),
                        order_id,
                        ticket_type_id: item.ticket_type_id,
                        quantity: item.quantity,
                        unit_price: ticket_type.unit_price(item.half_price),
                        half_price: item.half_price,
                        attendees: item.attendees.clone(),
                    });
                    reserved.push(line);
                }
                Err(err) => {
                    let _ = self.ledger.release_lines(&reserved).await;
                    return Err(err);
                }
            }
        }

        let subtotal: Decimal = items
            .iter()
            .map(|i| i.unit_price * Decimal::from(i.quantity))
            .sum();

        let requested_types: Vec<Uuid> = items.iter().map(|i| i.ticket_type_id).collect();
        let (promo_code_id, discount) = match &cmd.promo_code {
            Some(code) => {
                match self
                    .promos
                    .quote(cmd.event_id, code, subtotal, cmd.buyer.id, &requested_types)
                    .await
                {
                    Ok((promo, quote)) => (Some(promo.id), quote.discount),
                    Err(err) => {
                        let _ = self.ledger.release_lines(&reserved).await;
                        return Err(err);
                    }
                }
            }
            None => (None, Decimal::ZERO),
        };

        let discounted = subtotal - discount;
        let service_fee = self.service_fee(discounted);
        let total = discounted + service_fee;
        let free = total.is_zero();

        let billing = match (&cmd.billing, free) {
            (_, true) => None,
            (Some(billing), false) => Some(billing.clone()),
            (None, false) => {
                let _ = self.ledger.release_lines(&reserved).await;
                return Err(AppError::ValidationError(
                    "A billing method is required for paid orders".to_string(),
                ));
            }
        };

        let now = Utc::now();
        let order = Order {
            id: order_id,
            event_id: cmd.event_id,
            buyer_id: cmd.buyer.id,
            buyer_name: cmd.buyer.name.clone(),
            buyer_email: cmd.buyer.email.clone(),
            buyer_cpf: cmd.buyer.cpf.clone(),
            // Free orders skip the payment round-trip entirely.
            status: if free {
                OrderStatus::Confirmed
            } else {
                OrderStatus::Pending
            },
            subtotal,
            discount,
            service_fee,
            total,
            promo_code_id,
            payment_id: None,
            email_sent: false,
            email_sent_at: None,
            email_last_error: None,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.orders.insert(&order, &items).await {
            let _ = self.ledger.release_lines(&reserved).await;
            return Err(err);
        }

        if free {
            match self.finalize_effects(&order, &items).await {
                Ok(tickets) => {
                    return Ok(CheckoutOutcome {
                        order,
                        payment: None,
                        instructions: None,
                        tickets,
                    })
                }
                Err(err) => {
                    // Never leave a confirmed order with half-applied
                    // effects behind.
                    if let Err(rollback) = self
                        .orders
                        .force_status(order_id, OrderStatus::Cancelled)
                        .await
                    {
                        tracing::error!(
                            order_id = %order_id,
                            error = %rollback,
                            "Failed to cancel free order after confirmation failure"
                        );
                    }
                    return Err(err);
                }
            }
        }

        // The only genuine suspension point: a fallible, retriable call to
        // the provider. On failure the order stays PENDING with its
        // reservation held; the expiry sweep reclaims the stock if the buyer
        // never retries.
        let Some(billing) = billing else {
            return Err(AppError::InternalServerError(
                "Paid order without billing info".to_string(),
            ));
        };
        let customer_id = self
            .gateway
            .create_customer(CreateCustomerRequest {
                name: cmd.buyer.name.clone(),
                email: cmd.buyer.email.clone(),
                cpf: cmd.buyer.cpf.clone(),
            })
            .await?;
        let gateway_payment = self
            .gateway
            .create_payment(CreatePaymentRequest {
                customer_id,
                amount: total,
                method: billing.method,
                due_date: billing.due_date,
                description: format!("Ticket order {order_id}"),
                external_reference: order_id.to_string(),
                split: cmd.split.clone(),
                installments: billing.installments,
            })
            .await?;

        let snapshot = serde_json::to_value(&gateway_payment).map_err(|e| {
            AppError::InternalServerError(format!("Unserializable gateway response: {e}"))
        })?;
        let payment = Payment {
            id: Uuid::new_v4(),
            order_id,
            amount: total,
            method: billing.method,
            installments: billing.installments,
            provider: self.gateway.provider_name().to_string(),
            provider_payment_id: gateway_payment.id.clone(),
            provider_snapshot: snapshot,
            status: map_provider_status(&gateway_payment.status).unwrap_or(PaymentStatus::Pending),
            processed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.payments.insert(&payment).await?;
        self.orders.set_payment(order_id, payment.id).await?;
        self.orders
            .claim_transition(order_id, &[OrderStatus::Pending], OrderStatus::Processing)
            .await?;

        self.publisher.publish(&DomainEvent::PaymentStatusChanged {
            order_id,
            payment_id: payment.id,
            status: payment.status,
        });

        let order = self
            .orders
            .find(order_id)
            .await?
            .ok_or_else(|| AppError::InternalServerError("Order vanished after checkout".to_string()))?;
        Ok(CheckoutOutcome {
            order,
            payment: Some(payment),
            instructions: Some(gateway_payment),
            tickets: Vec::new(),
        })
    }

    /// Moves an order to CONFIRMED and applies the side effects at most
    /// once. Returns `None` when another caller (a duplicate webhook, a
    /// concurrent delivery) already resolved the order.
    pub async fn confirm_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Vec<TicketInstance>>, AppError> {
        let order = self
            .orders
            .find(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))?;

        let claimed = self
            .orders
            .claim_transition(
                order_id,
                &[OrderStatus::Pending, OrderStatus::Processing],
                OrderStatus::Confirmed,
            )
            .await?;
        if !claimed {
            return Ok(None);
        }

        let confirmed = Order {
            status: OrderStatus::Confirmed,
            ..order
        };
        let items = self.orders.items(order_id).await?;
        match self.finalize_effects(&confirmed, &items).await {
            Ok(tickets) => Ok(Some(tickets)),
            Err(err) => {
                // Compensating rollback: surrender the claim so a retry can
                // run the confirmation again.
                if let Err(rollback) = self
                    .orders
                    .force_status(order_id, OrderStatus::Processing)
                    .await
                {
                    tracing::error!(
                        order_id = %order_id,
                        error = %rollback,
                        "Failed to roll back confirmation claim"
                    );
                }
                Err(err)
            }
        }
    }

    /// Mint, commit stock, count promo usage, notify. Runs only behind a won
    /// status claim (or synchronously for a just-created free order).
    async fn finalize_effects(
        &self,
        order: &Order,
        items: &[OrderItem],
    ) -> Result<Vec<TicketInstance>, AppError> {
        let tickets = self.tickets.mint_for_order(order, items).await?;

        if let Err(err) = self.ledger.commit_items(items).await {
            let _ = self.tickets.void_for_order(order.id).await;
            return Err(err);
        }

        if let Some(promo_code_id) = order.promo_code_id {
            match self.promo_codes.increment_usage(promo_code_id).await {
                Ok(true) => {}
                Ok(false) => tracing::warn!(
                    promo_code_id = %promo_code_id,
                    order_id = %order.id,
                    "Promo usage cap reached at confirmation; order honored anyway"
                ),
                Err(err) => tracing::error!(
                    promo_code_id = %promo_code_id,
                    order_id = %order.id,
                    error = %err,
                    "Failed to count promo usage"
                ),
            }
        }

        self.publisher.publish(&DomainEvent::OrderConfirmed {
            order_id: order.id,
            ticket_instance_ids: tickets.iter().map(|t| t.id).collect(),
        });
        self.dispatch_confirmation_email(order.clone(), tickets.clone());
        Ok(tickets)
    }

    /// Email never gates confirmation; the outcome is recorded on the order.
    fn dispatch_confirmation_email(&self, order: Order, tickets: Vec<TicketInstance>) {
        let mailer = Arc::clone(&self.mailer);
        let orders = Arc::clone(&self.orders);
        tokio::spawn(async move {
            let outcome = mailer.send_order_confirmation(&order, &tickets).await;
            let record = match outcome {
                Ok(()) => orders.record_email_result(order.id, Some(Utc::now()), None).await,
                Err(reason) => {
                    tracing::warn!(order_id = %order.id, reason = %reason, "Confirmation email failed");
                    orders.record_email_result(order.id, None, Some(reason)).await
                }
            };
            if let Err(err) = record {
                tracing::error!(order_id = %order.id, error = %err, "Failed to record email outcome");
            }
        });
    }

    pub async fn cancel(&self, order_id: Uuid) -> Result<Order, AppError> {
        let order = self
            .orders
            .find(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))?;

        let claimed = self
            .orders
            .claim_transition(
                order_id,
                &[OrderStatus::Pending, OrderStatus::Processing],
                OrderStatus::Cancelled,
            )
            .await?;
        if !claimed {
            return Err(AppError::Conflict(format!(
                "Order cannot be cancelled from status {}",
                order.status.as_str()
            )));
        }

        let items = self.orders.items(order_id).await?;
        self.ledger.release_items(&items).await?;

        if let Some(payment) = self.payments.find_active_by_order(order_id).await? {
            if let Err(err) = self.gateway.cancel_payment(&payment.provider_payment_id).await {
                tracing::warn!(
                    order_id = %order_id,
                    provider_payment_id = %payment.provider_payment_id,
                    error = %err,
                    "Gateway payment cancellation failed; continuing"
                );
            }
            self.payments
                .update_status(payment.id, PaymentStatus::Cancelled, None, None)
                .await?;
            self.publisher.publish(&DomainEvent::PaymentStatusChanged {
                order_id,
                payment_id: payment.id,
                status: PaymentStatus::Cancelled,
            });
        }

        self.orders
            .find(order_id)
            .await?
            .ok_or_else(|| AppError::InternalServerError("Order vanished after cancel".to_string()))
    }

    /// Expires one stale unpaid order. Returns false when someone else
    /// resolved it first.
    pub async fn expire(&self, order_id: Uuid) -> Result<bool, AppError> {
        let claimed = self
            .orders
            .claim_transition(order_id, &[OrderStatus::Pending], OrderStatus::Expired)
            .await?;
        if !claimed {
            return Ok(false);
        }

        let items = self.orders.items(order_id).await?;
        self.ledger.release_items(&items).await?;

        if let Some(payment) = self.payments.find_active_by_order(order_id).await? {
            if let Err(err) = self.gateway.cancel_payment(&payment.provider_payment_id).await {
                tracing::warn!(
                    order_id = %order_id,
                    error = %err,
                    "Gateway payment cancellation failed during expiry"
                );
            }
            self.payments
                .update_status(payment.id, PaymentStatus::Cancelled, None, None)
                .await?;
        }
        tracing::info!(order_id = %order_id, "Stale unpaid order expired");
        Ok(true)
    }

    pub async fn details(&self, order_id: Uuid) -> Result<OrderDetails, AppError> {
        let order = self
            .orders
            .find(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))?;
        let items = self.orders.items(order_id).await?;
        let tickets = self.tickets.list_for_order(order_id).await?;
        Ok(OrderDetails {
            order,
            items,
            tickets,
        })
    }
}
