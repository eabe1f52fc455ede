//! Postgres repositories.
//!
//! Counter and status guards are expressed inside single `UPDATE` statements
//! so the check and the mutation are one atomic step; callers read
//! `rows_affected` to learn whether they won.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    Attendee, Event, Order, OrderItem, OrderStatus, Payment, PaymentStatus, PromoCode,
    TicketInstance, TicketStatus, TicketType,
};
use crate::models::payment::BillingMethod;
use crate::models::promo_code::DiscountKind;
use crate::repo::{
    EventRepository, OrderRepository, PaymentRepository, PromoCodeRepository,
    TicketInstanceRepository, TicketTypeRepository, TicketTypeUpdate,
};
use crate::utils::error::AppError;

fn bad_column(column: &str, value: &str) -> AppError {
    AppError::InternalServerError(format!("Unrecognized {column} '{value}' in database"))
}

fn map_ticket_type(row: &PgRow) -> Result<TicketType, AppError> {
    Ok(TicketType {
        id: row.try_get("id")?,
        event_id: row.try_get("event_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        total_quantity: row.try_get("total_quantity")?,
        quantity_sold: row.try_get("quantity_sold")?,
        quantity_reserved: row.try_get("quantity_reserved")?,
        half_price_quantity: row.try_get("half_price_quantity")?,
        half_price_sold: row.try_get("half_price_sold")?,
        half_price_reserved: row.try_get("half_price_reserved")?,
        min_per_order: row.try_get("min_per_order")?,
        max_per_order: row.try_get("max_per_order")?,
        sales_start: row.try_get("sales_start")?,
        sales_end: row.try_get("sales_end")?,
        visible: row.try_get("visible")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_order(row: &PgRow) -> Result<Order, AppError> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: row.try_get("id")?,
        event_id: row.try_get("event_id")?,
        buyer_id: row.try_get("buyer_id")?,
        buyer_name: row.try_get("buyer_name")?,
        buyer_email: row.try_get("buyer_email")?,
        buyer_cpf: row.try_get("buyer_cpf")?,
        status: OrderStatus::parse(&status).ok_or_else(|| bad_column("order status", &status))?,
        subtotal: row.try_get("subtotal")?,
        discount: row.try_get("discount")?,
        service_fee: row.try_get("service_fee")?,
        total: row.try_get("total")?,
        promo_code_id: row.try_get("promo_code_id")?,
        payment_id: row.try_get("payment_id")?,
        email_sent: row.try_get("email_sent")?,
        email_sent_at: row.try_get("email_sent_at")?,
        email_last_error: row.try_get("email_last_error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_order_item(row: &PgRow) -> Result<OrderItem, AppError> {
    let Json(attendees): Json<Vec<Attendee>> = row.try_get("attendees")?;
    Ok(OrderItem {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        ticket_type_id: row.try_get("ticket_type_id")?,
        quantity: row.try_get("quantity")?,
        unit_price: row.try_get("unit_price")?,
        half_price: row.try_get("half_price")?,
        attendees,
    })
}

fn map_payment(row: &PgRow) -> Result<Payment, AppError> {
    let status: String = row.try_get("status")?;
    let method: String = row.try_get("method")?;
    Ok(Payment {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        amount: row.try_get("amount")?,
        method: BillingMethod::parse(&method).ok_or_else(|| bad_column("billing method", &method))?,
        installments: row.try_get("installments")?,
        provider: row.try_get("provider")?,
        provider_payment_id: row.try_get("provider_payment_id")?,
        provider_snapshot: row.try_get("provider_snapshot")?,
        status: PaymentStatus::parse(&status).ok_or_else(|| bad_column("payment status", &status))?,
        processed_at: row.try_get("processed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_ticket_instance(row: &PgRow) -> Result<TicketInstance, AppError> {
    let status: String = row.try_get("status")?;
    Ok(TicketInstance {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        order_item_id: row.try_get("order_item_id")?,
        ticket_type_id: row.try_get("ticket_type_id")?,
        code: row.try_get("code")?,
        attendee_name: row.try_get("attendee_name")?,
        attendee_email: row.try_get("attendee_email")?,
        attendee_cpf: row.try_get("attendee_cpf")?,
        status: TicketStatus::parse(&status).ok_or_else(|| bad_column("ticket status", &status))?,
        checked_in_at: row.try_get("checked_in_at")?,
        checked_in_by: row.try_get("checked_in_by")?,
        check_in_location: row.try_get("check_in_location")?,
        check_in_notes: row.try_get("check_in_notes")?,
        transferred_from: row.try_get("transferred_from")?,
        transferred_at: row.try_get("transferred_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_promo_code(row: &PgRow) -> Result<PromoCode, AppError> {
    let kind: String = row.try_get("kind")?;
    Ok(PromoCode {
        id: row.try_get("id")?,
        event_id: row.try_get("event_id")?,
        code: row.try_get("code")?,
        kind: DiscountKind::parse(&kind).ok_or_else(|| bad_column("discount kind", &kind))?,
        value: row.try_get("value")?,
        max_uses: row.try_get("max_uses")?,
        max_uses_per_buyer: row.try_get("max_uses_per_buyer")?,
        current_uses: row.try_get("current_uses")?,
        valid_from: row.try_get("valid_from")?,
        valid_until: row.try_get("valid_until")?,
        min_order_value: row.try_get("min_order_value")?,
        max_discount: row.try_get("max_discount")?,
        ticket_type_ids: row.try_get("ticket_type_ids")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn insert(&self, event: &Event) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO events (id, organizer_id, title, description, location, start_time, end_time, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(event.id)
        .bind(event.organizer_id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }
}

pub struct PgTicketTypeRepository {
    pool: PgPool,
}

impl PgTicketTypeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketTypeRepository for PgTicketTypeRepository {
    async fn insert(&self, ticket_type: &TicketType) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO ticket_types (id, event_id, name, description, price, total_quantity,
                quantity_sold, quantity_reserved, half_price_quantity, half_price_sold,
                half_price_reserved, min_per_order, max_per_order, sales_start, sales_end,
                visible, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(ticket_type.id)
        .bind(ticket_type.event_id)
        .bind(&ticket_type.name)
        .bind(&ticket_type.description)
        .bind(ticket_type.price)
        .bind(ticket_type.total_quantity)
        .bind(ticket_type.quantity_sold)
        .bind(ticket_type.quantity_reserved)
        .bind(ticket_type.half_price_quantity)
        .bind(ticket_type.half_price_sold)
        .bind(ticket_type.half_price_reserved)
        .bind(ticket_type.min_per_order)
        .bind(ticket_type.max_per_order)
        .bind(ticket_type.sales_start)
        .bind(ticket_type.sales_end)
        .bind(ticket_type.visible)
        .bind(ticket_type.created_at)
        .bind(ticket_type.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<TicketType>, AppError> {
        let row = sqlx::query("SELECT * FROM ticket_types WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_ticket_type).transpose()
    }

    async fn update_config(&self, id: Uuid, update: &TicketTypeUpdate) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE ticket_types SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                total_quantity = COALESCE($5, total_quantity),
                min_per_order = COALESCE($6, min_per_order),
                max_per_order = COALESCE($7, max_per_order),
                sales_start = COALESCE($8, sales_start),
                sales_end = COALESCE($9, sales_end),
                visible = COALESCE($10, visible),
                updated_at = NOW()
             WHERE id = $1
               AND COALESCE($5, total_quantity) >= quantity_sold + quantity_reserved",
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.price)
        .bind(update.total_quantity)
        .bind(update.min_per_order)
        .bind(update.max_per_order)
        .bind(update.sales_start)
        .bind(update.sales_end)
        .bind(update.visible)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn try_reserve(
        &self,
        id: Uuid,
        quantity: i32,
        half_quantity: i32,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE ticket_types
             SET quantity_reserved = quantity_reserved + $2,
                 half_price_reserved = half_price_reserved + $3,
                 updated_at = NOW()
             WHERE id = $1
               AND total_quantity - quantity_sold - quantity_reserved >= $2
               AND ($3 = 0 OR COALESCE(half_price_quantity, 0) - half_price_sold - half_price_reserved >= $3)",
        )
        .bind(id)
        .bind(quantity)
        .bind(half_quantity)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit_reserved(
        &self,
        id: Uuid,
        quantity: i32,
        half_quantity: i32,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE ticket_types
             SET quantity_sold = quantity_sold + LEAST($2, quantity_reserved),
                 quantity_reserved = quantity_reserved - LEAST($2, quantity_reserved),
                 half_price_sold = half_price_sold + LEAST($3, half_price_reserved),
                 half_price_reserved = half_price_reserved - LEAST($3, half_price_reserved),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(quantity)
        .bind(half_quantity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release_reserved(
        &self,
        id: Uuid,
        quantity: i32,
        half_quantity: i32,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE ticket_types
             SET quantity_reserved = GREATEST(quantity_reserved - $2, 0),
                 half_price_reserved = GREATEST(half_price_reserved - $3, 0),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(quantity)
        .bind(half_quantity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert(&self, order: &Order, items: &[OrderItem]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders (id, event_id, buyer_id, buyer_name, buyer_email, buyer_cpf,
                status, subtotal, discount, service_fee, total, promo_code_id, payment_id,
                email_sent, email_sent_at, email_last_error, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(order.id)
        .bind(order.event_id)
        .bind(order.buyer_id)
        .bind(&order.buyer_name)
        .bind(&order.buyer_email)
        .bind(&order.buyer_cpf)
        .bind(order.status.as_str())
        .bind(order.subtotal)
        .bind(order.discount)
        .bind(order.service_fee)
        .bind(order.total)
        .bind(order.promo_code_id)
        .bind(order.payment_id)
        .bind(order.email_sent)
        .bind(order.email_sent_at)
        .bind(&order.email_last_error)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, ticket_type_id, quantity, unit_price, half_price, attendees)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(item.id)
            .bind(item.order_id)
            .bind(item.ticket_type_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.half_price)
            .bind(Json(&item.attendees))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Order>, AppError> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_order).transpose()
    }

    async fn items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, AppError> {
        let rows = sqlx::query("SELECT * FROM order_items WHERE order_id = $1")
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_order_item).collect()
    }

    async fn claim_transition(
        &self,
        id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<bool, AppError> {
        let from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();
        let result = sqlx::query(
            "UPDATE orders SET status = $2, updated_at = NOW()
             WHERE id = $1 AND status = ANY($3)",
        )
        .bind(id)
        .bind(to.as_str())
        .bind(&from)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn force_status(&self, id: Uuid, status: OrderStatus) -> Result<(), AppError> {
        sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_payment(&self, id: Uuid, payment_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE orders SET payment_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(payment_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_email_result(
        &self,
        id: Uuid,
        sent_at: Option<DateTime<Utc>>,
        error: Option<String>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE orders SET email_sent = $2, email_sent_at = $3, email_last_error = $4,
                updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(sent_at.is_some())
        .bind(sent_at)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, AppError> {
        let rows = sqlx::query("SELECT * FROM orders WHERE status = 'PENDING' AND created_at < $1")
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_order).collect()
    }

    async fn count_confirmed_with_promo(
        &self,
        promo_id: Uuid,
        buyer_id: Uuid,
    ) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders
             WHERE promo_code_id = $1 AND buyer_id = $2 AND status IN ('CONFIRMED', 'COMPLETED')",
        )
        .bind(promo_id)
        .bind(buyer_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    async fn insert(&self, payment: &Payment) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO payments (id, order_id, amount, method, installments, provider,
                provider_payment_id, provider_snapshot, status, processed_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(payment.id)
        .bind(payment.order_id)
        .bind(payment.amount)
        .bind(payment.method.as_str())
        .bind(payment.installments)
        .bind(&payment.provider)
        .bind(&payment.provider_payment_id)
        .bind(&payment.provider_snapshot)
        .bind(payment.status.as_str())
        .bind(payment.processed_at)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Payment>, AppError> {
        let row = sqlx::query("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_payment).transpose()
    }

    async fn find_by_provider_id(
        &self,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, AppError> {
        let row = sqlx::query("SELECT * FROM payments WHERE provider_payment_id = $1")
            .bind(provider_payment_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_payment).transpose()
    }

    async fn find_active_by_order(&self, order_id: Uuid) -> Result<Option<Payment>, AppError> {
        let row = sqlx::query(
            "SELECT * FROM payments
             WHERE order_id = $1 AND status <> 'CANCELLED'
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_payment).transpose()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
        snapshot: Option<&serde_json::Value>,
        processed_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE payments SET status = $2,
                provider_snapshot = COALESCE($3, provider_snapshot),
                processed_at = COALESCE($4, processed_at),
                updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(snapshot)
        .bind(processed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub struct PgTicketInstanceRepository {
    pool: PgPool,
}

impl PgTicketInstanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketInstanceRepository for PgTicketInstanceRepository {
    async fn insert_all(&self, instances: &[TicketInstance]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        for instance in instances {
            sqlx::query(
                "INSERT INTO ticket_instances (id, order_id, order_item_id, ticket_type_id, code,
                    attendee_name, attendee_email, attendee_cpf, status, checked_in_at,
                    checked_in_by, check_in_location, check_in_notes, transferred_from,
                    transferred_at, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
            )
            .bind(instance.id)
            .bind(instance.order_id)
            .bind(instance.order_item_id)
            .bind(instance.ticket_type_id)
            .bind(&instance.code)
            .bind(&instance.attendee_name)
            .bind(&instance.attendee_email)
            .bind(&instance.attendee_cpf)
            .bind(instance.status.as_str())
            .bind(instance.checked_in_at)
            .bind(instance.checked_in_by)
            .bind(&instance.check_in_location)
            .bind(&instance.check_in_notes)
            .bind(&instance.transferred_from)
            .bind(instance.transferred_at)
            .bind(instance.created_at)
            .bind(instance.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<TicketInstance>, AppError> {
        let row = sqlx::query("SELECT * FROM ticket_instances WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_ticket_instance).transpose()
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<TicketInstance>, AppError> {
        let row = sqlx::query("SELECT * FROM ticket_instances WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_ticket_instance).transpose()
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<TicketInstance>, AppError> {
        let rows =
            sqlx::query("SELECT * FROM ticket_instances WHERE order_id = $1 ORDER BY created_at")
                .bind(order_id)
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(map_ticket_instance).collect()
    }

    async fn exists_for_order(&self, order_id: Uuid) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM ticket_instances
             WHERE order_id = $1 AND status <> 'CANCELLED')",
        )
        .bind(order_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn check_in(
        &self,
        id: Uuid,
        operator: Uuid,
        location: Option<&str>,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE ticket_instances
             SET status = 'CHECKED_IN', checked_in_at = $2, checked_in_by = $3,
                 check_in_location = $4, check_in_notes = $5, updated_at = $2
             WHERE id = $1 AND status = 'ACTIVE'",
        )
        .bind(id)
        .bind(at)
        .bind(operator)
        .bind(location)
        .bind(notes)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn transfer(
        &self,
        id: Uuid,
        attendee: &Attendee,
        previous_holder: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE ticket_instances
             SET attendee_name = $2, attendee_email = $3, attendee_cpf = $4,
                 transferred_from = $5, transferred_at = $6, updated_at = $6
             WHERE id = $1 AND status = 'ACTIVE'",
        )
        .bind(id)
        .bind(&attendee.name)
        .bind(&attendee.email)
        .bind(&attendee.cpf)
        .bind(previous_holder)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn cancel(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE ticket_instances SET status = 'CANCELLED', updated_at = NOW()
             WHERE id = $1 AND status = 'ACTIVE'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn cancel_all_for_order(&self, order_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE ticket_instances SET status = 'CANCELLED', updated_at = NOW()
             WHERE order_id = $1 AND status = 'ACTIVE'",
        )
        .bind(order_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub struct PgPromoCodeRepository {
    pool: PgPool,
}

impl PgPromoCodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PromoCodeRepository for PgPromoCodeRepository {
    async fn insert(&self, promo: &PromoCode) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO promo_codes (id, event_id, code, kind, value, max_uses,
                max_uses_per_buyer, current_uses, valid_from, valid_until, min_order_value,
                max_discount, ticket_type_ids, active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(promo.id)
        .bind(promo.event_id)
        .bind(&promo.code)
        .bind(promo.kind.as_str())
        .bind(promo.value)
        .bind(promo.max_uses)
        .bind(promo.max_uses_per_buyer)
        .bind(promo.current_uses)
        .bind(promo.valid_from)
        .bind(promo.valid_until)
        .bind(promo.min_order_value)
        .bind(promo.max_discount)
        .bind(&promo.ticket_type_ids)
        .bind(promo.active)
        .bind(promo.created_at)
        .bind(promo.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<PromoCode>, AppError> {
        let row = sqlx::query("SELECT * FROM promo_codes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_promo_code).transpose()
    }

    async fn find_by_code(
        &self,
        event_id: Uuid,
        code: &str,
    ) -> Result<Option<PromoCode>, AppError> {
        let row =
            sqlx::query("SELECT * FROM promo_codes WHERE event_id = $1 AND UPPER(code) = UPPER($2)")
                .bind(event_id)
                .bind(code)
                .fetch_optional(&self.pool)
                .await?;
        row.as_ref().map(map_promo_code).transpose()
    }

    async fn increment_usage(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE promo_codes SET current_uses = current_uses + 1, updated_at = NOW()
             WHERE id = $1 AND (max_uses IS NULL OR current_uses < max_uses)",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
