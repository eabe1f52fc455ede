use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use crate::services::orders::CheckoutCommand;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

pub async fn checkout(
    State(state): State<AppState>,
    Json(command): Json<CheckoutCommand>,
) -> Result<Response, AppError> {
    let outcome = state.orders.checkout(command, true).await?;
    Ok(created(outcome, "Order placed").into_response())
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let details = state.orders.details(order_id).await?;
    Ok(success(details, "Order fetched").into_response())
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let order = state.orders.cancel(order_id).await?;
    Ok(success(order, "Order cancelled").into_response())
}

/// Explicit reconciliation against the provider, for when webhooks were
/// missed or delayed.
pub async fn sync_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let disposition = state.reconciler.sync_order(order_id).await?;
    Ok(success(disposition, "Order synchronized").into_response())
}

pub async fn order_tickets(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    state.orders.details(order_id).await.map(|details| {
        success(details.tickets, "Order tickets fetched").into_response()
    })
}
