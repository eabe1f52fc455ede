use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::TicketType;
use crate::repo::{EventRepository, TicketTypeRepository, TicketTypeUpdate};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Debug, Deserialize)]
pub struct CreateTicketTypeRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub total_quantity: i32,
    pub half_price_quantity: Option<i32>,
    #[serde(default = "default_min_per_order")]
    pub min_per_order: i32,
    #[serde(default = "default_max_per_order")]
    pub max_per_order: i32,
    pub sales_start: DateTime<Utc>,
    pub sales_end: DateTime<Utc>,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_min_per_order() -> i32 {
    1
}

fn default_max_per_order() -> i32 {
    10
}

fn default_visible() -> bool {
    true
}

pub async fn create_ticket_type(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(body): Json<CreateTicketTypeRequest>,
) -> Result<Response, AppError> {
    state
        .events
        .find(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {event_id} not found")))?;

    if body.name.trim().is_empty() {
        return Err(AppError::ValidationError("Name is required".to_string()));
    }
    if body.price < Decimal::ZERO {
        return Err(AppError::ValidationError(
            "Price cannot be negative".to_string(),
        ));
    }
    if body.total_quantity <= 0 {
        return Err(AppError::ValidationError(
            "Total quantity must be positive".to_string(),
        ));
    }
    if let Some(half) = body.half_price_quantity {
        if half < 0 || half > body.total_quantity {
            return Err(AppError::ValidationError(
                "Half-price quantity must be between 0 and the total quantity".to_string(),
            ));
        }
    }
    if body.min_per_order < 1 || body.max_per_order < body.min_per_order {
        return Err(AppError::ValidationError(
            "Per-order limits must satisfy 1 <= min <= max".to_string(),
        ));
    }
    if body.sales_end <= body.sales_start {
        return Err(AppError::ValidationError(
            "Sales window must end after it starts".to_string(),
        ));
    }

    let now = Utc::now();
    let ticket_type = TicketType {
        id: Uuid::new_v4(),
        event_id,
        name: body.name,
        description: body.description,
        price: body.price,
        total_quantity: body.total_quantity,
        quantity_sold: 0,
        quantity_reserved: 0,
        half_price_quantity: body.half_price_quantity,
        half_price_sold: 0,
        half_price_reserved: 0,
        min_per_order: body.min_per_order,
        max_per_order: body.max_per_order,
        sales_start: body.sales_start,
        sales_end: body.sales_end,
        visible: body.visible,
        created_at: now,
        updated_at: now,
    };
    state.ticket_types.insert(&ticket_type).await?;

    tracing::info!(ticket_type_id = %ticket_type.id, event_id = %event_id, "Ticket type created");
    Ok(created(ticket_type, "Ticket type created").into_response())
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketTypeRequest {
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

pub async fn update_ticket_type(
    State(state): State<AppState>,
    Path(ticket_type_id): Path<Uuid>,
    Json(body): Json<UpdateTicketTypeRequest>,
) -> Result<Response, AppError> {
    state
        .ticket_types
        .find(ticket_type_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket type {ticket_type_id} not found")))?;

    if let Some(total) = body.total_quantity {
        if total <= 0 {
            return Err(AppError::ValidationError(
                "Total quantity must be positive".to_string(),
            ));
        }
    }

    let update = TicketTypeUpdate {
        name: body.name,
        description: body.description,
        price: body.price,
        total_quantity: body.total_quantity,
        min_per_order: body.min_per_order,
        max_per_order: body.max_per_order,
        sales_start: body.sales_start,
        sales_end: body.sales_end,
        visible: body.visible,
    };
    let applied = state.ticket_types.update_config(ticket_type_id, &update).await?;
    if !applied {
        return Err(AppError::Conflict(
            "Cannot reduce total quantity below seats already sold or reserved".to_string(),
        ));
    }

    let ticket_type = state
        .ticket_types
        .find(ticket_type_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket type {ticket_type_id} not found")))?;
    Ok(success(ticket_type, "Ticket type updated").into_response())
}

pub async fn availability(
    State(state): State<AppState>,
    Path(ticket_type_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let availability = state.ledger.availability(ticket_type_id).await?;
    Ok(success(availability, "Availability fetched").into_response())
}
