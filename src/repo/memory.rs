//! In-memory repositories.
//!
//! These back the test suites and uphold the same atomicity contract as the
//! Postgres implementations: every guarded mutation happens under a single
//! lock acquisition. Ticket-type counters get one mutex per row so concurrent
//! buyers contend per ticket type, not globally.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Attendee, Event, Order, OrderItem, OrderStatus, Payment, PaymentStatus, PromoCode,
    TicketInstance, TicketStatus, TicketType,
};
use crate::repo::{
    EventRepository, OrderRepository, PaymentRepository, PromoCodeRepository,
    TicketInstanceRepository, TicketTypeRepository, TicketTypeUpdate,
};
use crate::utils::error::AppError;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(rw: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    rw.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(rw: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    rw.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct InMemoryEventRepository {
    rows: RwLock<HashMap<Uuid, Event>>,
}

impl InMemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn insert(&self, event: &Event) -> Result<(), AppError> {
        write(&self.rows).insert(event.id, event.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        Ok(read(&self.rows).get(&id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryTicketTypeRepository {
    rows: RwLock<HashMap<Uuid, Arc<Mutex<TicketType>>>>,
}

impl InMemoryTicketTypeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn row(&self, id: Uuid) -> Option<Arc<Mutex<TicketType>>> {
        read(&self.rows).get(&id).cloned()
    }
}

#[async_trait]
impl TicketTypeRepository for InMemoryTicketTypeRepository {
    async fn insert(&self, ticket_type: &TicketType) -> Result<(), AppError> {
        write(&self.rows).insert(ticket_type.id, Arc::new(Mutex::new(ticket_type.clone())));
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<TicketType>, AppError> {
        Ok(self.row(id).map(|row| lock(&row).clone()))
    }

    async fn update_config(&self, id: Uuid, update: &TicketTypeUpdate) -> Result<bool, AppError> {
        let row = self
            .row(id)
            .ok_or_else(|| AppError::NotFound(format!("Ticket type {id} not found")))?;
        let mut tt = lock(&row);

        if let Some(total) = update.total_quantity {
            if total < tt.quantity_sold + tt.quantity_reserved {
                return Ok(false);
            }
            tt.total_quantity = total;
        }
        if let Some(name) = &update.name {
            tt.name = name.clone();
        }
        if let Some(description) = &update.description {
            tt.description = Some(description.clone());
        }
        if let Some(price) = update.price {
            tt.price = price;
        }
        if let Some(min) = update.min_per_order {
            tt.min_per_order = min;
        }
        if let Some(max) = update.max_per_order {
            tt.max_per_order = max;
        }
        if let Some(start) = update.sales_start {
            tt.sales_start = start;
        }
        if let Some(end) = update.sales_end {
            tt.sales_end = end;
        }
        if let Some(visible) = update.visible {
            tt.visible = visible;
        }
        tt.updated_at = Utc::now();
        Ok(true)
    }

    async fn try_reserve(
        &self,
        id: Uuid,
        quantity: i32,
        half_quantity: i32,
    ) -> Result<bool, AppError> {
        let row = self
            .row(id)
            .ok_or_else(|| AppError::NotFound(format!("Ticket type {id} not found")))?;
        let mut tt = lock(&row);

        if tt.available() < quantity {
            return Ok(false);
        }
        if half_quantity > 0 && tt.half_price_available() < half_quantity {
            return Ok(false);
        }

        tt.quantity_reserved += quantity;
        tt.half_price_reserved += half_quantity;
        tt.updated_at = Utc::now();
        Ok(true)
    }

    async fn commit_reserved(
        &self,
        id: Uuid,
        quantity: i32,
        half_quantity: i32,
    ) -> Result<(), AppError> {
        let row = self
            .row(id)
            .ok_or_else(|| AppError::NotFound(format!("Ticket type {id} not found")))?;
        let mut tt = lock(&row);

        let committed = quantity.min(tt.quantity_reserved);
        tt.quantity_reserved -= committed;
        tt.quantity_sold += committed;

        let half_committed = half_quantity.min(tt.half_price_reserved);
        tt.half_price_reserved -= half_committed;
        tt.half_price_sold += half_committed;

        tt.updated_at = Utc::now();
        Ok(())
    }

    async fn release_reserved(
        &self,
        id: Uuid,
        quantity: i32,
        half_quantity: i32,
    ) -> Result<(), AppError> {
        let row = self
            .row(id)
            .ok_or_else(|| AppError::NotFound(format!("Ticket type {id} not found")))?;
        let mut tt = lock(&row);

        tt.quantity_reserved = (tt.quantity_reserved - quantity).max(0);
        tt.half_price_reserved = (tt.half_price_reserved - half_quantity).max(0);
        tt.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
    items: RwLock<HashMap<Uuid, Vec<OrderItem>>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: &Order, items: &[OrderItem]) -> Result<(), AppError> {
        write(&self.orders).insert(order.id, order.clone());
        write(&self.items).insert(order.id, items.to_vec());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Order>, AppError> {
        Ok(read(&self.orders).get(&id).cloned())
    }

    async fn items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, AppError> {
        Ok(read(&self.items).get(&order_id).cloned().unwrap_or_default())
    }

    async fn claim_transition(
        &self,
        id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<bool, AppError> {
        let mut orders = write(&self.orders);
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))?;
        if !from.contains(&order.status) {
            return Ok(false);
        }
        order.status = to;
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn force_status(&self, id: Uuid, status: OrderStatus) -> Result<(), AppError> {
        let mut orders = write(&self.orders);
        if let Some(order) = orders.get_mut(&id) {
            order.status = status;
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_payment(&self, id: Uuid, payment_id: Uuid) -> Result<(), AppError> {
        let mut orders = write(&self.orders);
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))?;
        order.payment_id = Some(payment_id);
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn record_email_result(
        &self,
        id: Uuid,
        sent_at: Option<DateTime<Utc>>,
        error: Option<String>,
    ) -> Result<(), AppError> {
        let mut orders = write(&self.orders);
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))?;
        order.email_sent = sent_at.is_some();
        order.email_sent_at = sent_at;
        order.email_last_error = error;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, AppError> {
        Ok(read(&self.orders)
            .values()
            .filter(|o| o.status == OrderStatus::Pending && o.created_at < cutoff)
            .cloned()
            .collect())
    }

    async fn count_confirmed_with_promo(
        &self,
        promo_id: Uuid,
        buyer_id: Uuid,
    ) -> Result<i64, AppError> {
        Ok(read(&self.orders)
            .values()
            .filter(|o| {
                o.promo_code_id == Some(promo_id)
                    && o.buyer_id == buyer_id
                    && matches!(o.status, OrderStatus::Confirmed | OrderStatus::Completed)
            })
            .count() as i64)
    }
}

#[derive(Default)]
pub struct InMemoryPaymentRepository {
    rows: RwLock<HashMap<Uuid, Payment>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn insert(&self, payment: &Payment) -> Result<(), AppError> {
        let mut rows = write(&self.rows);
        if rows
            .values()
            .any(|p| p.provider_payment_id == payment.provider_payment_id)
        {
            return Err(AppError::Conflict(format!(
                "Provider payment id {} already recorded",
                payment.provider_payment_id
            )));
        }
        rows.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Payment>, AppError> {
        Ok(read(&self.rows).get(&id).cloned())
    }

    async fn find_by_provider_id(
        &self,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, AppError> {
        Ok(read(&self.rows)
            .values()
            .find(|p| p.provider_payment_id == provider_payment_id)
            .cloned())
    }

    async fn find_active_by_order(&self, order_id: Uuid) -> Result<Option<Payment>, AppError> {
        Ok(read(&self.rows)
            .values()
            .find(|p| p.order_id == order_id && p.status != PaymentStatus::Cancelled)
            .cloned())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
        snapshot: Option<&serde_json::Value>,
        processed_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let mut rows = write(&self.rows);
        let payment = rows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Payment {id} not found")))?;
        payment.status = status;
        if let Some(snapshot) = snapshot {
            payment.provider_snapshot = snapshot.clone();
        }
        if processed_at.is_some() {
            payment.processed_at = processed_at;
        }
        payment.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTicketInstanceRepository {
    rows: RwLock<HashMap<Uuid, TicketInstance>>,
}

impl InMemoryTicketInstanceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TicketInstanceRepository for InMemoryTicketInstanceRepository {
    async fn insert_all(&self, instances: &[TicketInstance]) -> Result<(), AppError> {
        let mut rows = write(&self.rows);
        for instance in instances {
            if rows.values().any(|t| t.code == instance.code) {
                return Err(AppError::Conflict(format!(
                    "Ticket code {} already exists",
                    instance.code
                )));
            }
        }
        for instance in instances {
            rows.insert(instance.id, instance.clone());
        }
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<TicketInstance>, AppError> {
        Ok(read(&self.rows).get(&id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<TicketInstance>, AppError> {
        Ok(read(&self.rows).values().find(|t| t.code == code).cloned())
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<TicketInstance>, AppError> {
        let mut tickets: Vec<TicketInstance> = read(&self.rows)
            .values()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect();
        tickets.sort_by_key(|t| t.created_at);
        Ok(tickets)
    }

    async fn exists_for_order(&self, order_id: Uuid) -> Result<bool, AppError> {
        Ok(read(&self.rows)
            .values()
            .any(|t| t.order_id == order_id && t.status != TicketStatus::Cancelled))
    }

    async fn check_in(
        &self,
        id: Uuid,
        operator: Uuid,
        location: Option<&str>,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut rows = write(&self.rows);
        let ticket = rows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Ticket instance {id} not found")))?;
        if ticket.status != TicketStatus::Active {
            return Ok(false);
        }
        ticket.status = TicketStatus::CheckedIn;
        ticket.checked_in_at = Some(at);
        ticket.checked_in_by = Some(operator);
        ticket.check_in_location = location.map(str::to_string);
        ticket.check_in_notes = notes.map(str::to_string);
        ticket.updated_at = at;
        Ok(true)
    }

    async fn transfer(
        &self,
        id: Uuid,
        attendee: &Attendee,
        previous_holder: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut rows = write(&self.rows);
        let ticket = rows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Ticket instance {id} not found")))?;
        if ticket.status != TicketStatus::Active {
            return Ok(false);
        }
        ticket.attendee_name = Some(attendee.name.clone());
        ticket.attendee_email = attendee.email.clone();
        ticket.attendee_cpf = attendee.cpf.clone();
        ticket.transferred_from = Some(previous_holder.to_string());
        ticket.transferred_at = Some(at);
        ticket.updated_at = at;
        Ok(true)
    }

    async fn cancel(&self, id: Uuid) -> Result<bool, AppError> {
        let mut rows = write(&self.rows);
        let ticket = rows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Ticket instance {id} not found")))?;
        if ticket.status != TicketStatus::Active {
            return Ok(false);
        }
        ticket.status = TicketStatus::Cancelled;
        ticket.updated_at = Utc::now();
        Ok(true)
    }

    async fn cancel_all_for_order(&self, order_id: Uuid) -> Result<(), AppError> {
        let mut rows = write(&self.rows);
        let now = Utc::now();
        for ticket in rows.values_mut().filter(|t| t.order_id == order_id) {
            ticket.status = TicketStatus::Cancelled;
            ticket.updated_at = now;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPromoCodeRepository {
    rows: RwLock<HashMap<Uuid, PromoCode>>,
}

impl InMemoryPromoCodeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PromoCodeRepository for InMemoryPromoCodeRepository {
    async fn insert(&self, promo: &PromoCode) -> Result<(), AppError> {
        write(&self.rows).insert(promo.id, promo.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<PromoCode>, AppError> {
        Ok(read(&self.rows).get(&id).cloned())
    }

    async fn find_by_code(
        &self,
        event_id: Uuid,
        code: &str,
    ) -> Result<Option<PromoCode>, AppError> {
        Ok(read(&self.rows)
            .values()
            .find(|p| p.event_id == event_id && p.code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn increment_usage(&self, id: Uuid) -> Result<bool, AppError> {
        let mut rows = write(&self.rows);
        let promo = rows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Promo code {id} not found")))?;
        if let Some(max) = promo.max_uses {
            if promo.current_uses >= max {
                return Ok(false);
            }
        }
        promo.current_uses += 1;
        promo.updated_at = Utc::now();
        Ok(true)
    }
}
