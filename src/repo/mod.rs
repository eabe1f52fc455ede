//! Data-access seams, one trait per aggregate.
//!
//! Core services receive these as `Arc<dyn ...>` so the state machines can be
//! exercised against the in-memory implementations while production wires the
//! Postgres ones. Counter and status mutations that must be atomic are part
//! of the trait contract, not left to callers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    Attendee, Event, Order, OrderItem, OrderStatus, Payment, PaymentStatus, PromoCode,
    TicketInstance, TicketType,
};
use crate::utils::error::AppError;

pub mod memory;
pub mod postgres;

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn insert(&self, event: &Event) -> Result<(), AppError>;
    async fn find(&self, id: Uuid) -> Result<Option<Event>, AppError>;
}

/// Organizer-editable ticket type fields. Counter columns are deliberately
/// absent; those move only through reserve/commit/release.
#[derive(Debug, Clone, Default)]
pub struct TicketTypeUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub total_quantity: Option<i32>,
    pub min_per_order: Option<i32>,
    pub max_per_order: Option<i32>,
    pub sales_start: Option<DateTime<Utc>>,
    pub sales_end: Option<DateTime<Utc>>,
    pub visible: Option<bool>,
}

#[async_trait]
pub trait TicketTypeRepository: Send + Sync {
    async fn insert(&self, ticket_type: &TicketType) -> Result<(), AppError>;
    async fn find(&self, id: Uuid) -> Result<Option<TicketType>, AppError>;

    /// Applies an organizer edit. Returns false when the edit would shrink
    /// `total_quantity` below what is already sold or reserved.
    async fn update_config(&self, id: Uuid, update: &TicketTypeUpdate) -> Result<bool, AppError>;

    /// Single atomic stock check + reserve increment. `half_quantity` is the
    /// portion of `quantity` drawn from the half-price sub-pool (0 or equal
    /// to `quantity`). Returns false when stock is insufficient, leaving the
    /// counters untouched.
    async fn try_reserve(&self, id: Uuid, quantity: i32, half_quantity: i32)
        -> Result<bool, AppError>;

    /// Converts reserved units to sold. Clamps at zero rather than driving
    /// `quantity_reserved` negative.
    async fn commit_reserved(
        &self,
        id: Uuid,
        quantity: i32,
        half_quantity: i32,
    ) -> Result<(), AppError>;

    /// Returns reserved units to the pool without selling them. Clamps at
    /// zero rather than driving `quantity_reserved` negative.
    async fn release_reserved(
        &self,
        id: Uuid,
        quantity: i32,
        half_quantity: i32,
    ) -> Result<(), AppError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: &Order, items: &[OrderItem]) -> Result<(), AppError>;
    async fn find(&self, id: Uuid) -> Result<Option<Order>, AppError>;
    async fn items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, AppError>;

    /// Atomic status compare-and-set: moves the order to `to` only if its
    /// current status is one of `from`. Returns true when this caller won
    /// the transition; concurrent or repeated callers observe false.
    async fn claim_transition(
        &self,
        id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<bool, AppError>;

    /// Force a status, bypassing the transition table. Reserved for
    /// compensating rollbacks after a partial confirmation.
    async fn force_status(&self, id: Uuid, status: OrderStatus) -> Result<(), AppError>;

    async fn set_payment(&self, id: Uuid, payment_id: Uuid) -> Result<(), AppError>;

    async fn record_email_result(
        &self,
        id: Uuid,
        sent_at: Option<DateTime<Utc>>,
        error: Option<String>,
    ) -> Result<(), AppError>;

    /// Unpaid orders still `PENDING` whose hold window lapsed before `cutoff`.
    async fn stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, AppError>;

    /// How many confirmed/completed orders this buyer has placed with the
    /// given promo code. Backs the per-buyer usage cap.
    async fn count_confirmed_with_promo(
        &self,
        promo_id: Uuid,
        buyer_id: Uuid,
    ) -> Result<i64, AppError>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert(&self, payment: &Payment) -> Result<(), AppError>;
    async fn find(&self, id: Uuid) -> Result<Option<Payment>, AppError>;
    async fn find_by_provider_id(
        &self,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, AppError>;

    /// The order's current (non-cancelled) payment, if any.
    async fn find_active_by_order(&self, order_id: Uuid) -> Result<Option<Payment>, AppError>;

    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
        snapshot: Option<&serde_json::Value>,
        processed_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError>;
}

#[async_trait]
pub trait TicketInstanceRepository: Send + Sync {
    /// Inserts a batch of freshly minted instances. Fails the whole batch on
    /// a duplicate scannable code.
    async fn insert_all(&self, instances: &[TicketInstance]) -> Result<(), AppError>;
    async fn find(&self, id: Uuid) -> Result<Option<TicketInstance>, AppError>;
    async fn find_by_code(&self, code: &str) -> Result<Option<TicketInstance>, AppError>;
    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<TicketInstance>, AppError>;

    /// Whether the order already has live (non-cancelled) instances. Voided
    /// instances from a rolled-back confirmation do not count, so a retry
    /// can mint fresh ones.
    async fn exists_for_order(&self, order_id: Uuid) -> Result<bool, AppError>;

    /// Atomic `ACTIVE -> CHECKED_IN`. Returns false when the instance was
    /// not `ACTIVE` (already checked in, or cancelled).
    async fn check_in(
        &self,
        id: Uuid,
        operator: Uuid,
        location: Option<&str>,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Atomic attendee reassignment, permitted only while `ACTIVE`.
    async fn transfer(
        &self,
        id: Uuid,
        attendee: &Attendee,
        previous_holder: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn cancel(&self, id: Uuid) -> Result<bool, AppError>;
    async fn cancel_all_for_order(&self, order_id: Uuid) -> Result<(), AppError>;
}

#[async_trait]
pub trait PromoCodeRepository: Send + Sync {
    async fn insert(&self, promo: &PromoCode) -> Result<(), AppError>;
    async fn find(&self, id: Uuid) -> Result<Option<PromoCode>, AppError>;
    async fn find_by_code(&self, event_id: Uuid, code: &str) -> Result<Option<PromoCode>, AppError>;

    /// Guarded increment of `current_uses`. Returns false when the global
    /// cap is already exhausted. Never decrements.
    async fn increment_usage(&self, id: Uuid) -> Result<bool, AppError>;
}
