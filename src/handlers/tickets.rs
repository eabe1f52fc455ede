use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::Attendee;
use crate::services::tickets::CheckInRequest;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub async fn check_in(
    State(state): State<AppState>,
    Json(request): Json<CheckInRequest>,
) -> Result<Response, AppError> {
    let ticket = state.tickets.check_in(&request).await?;
    Ok(success(ticket, "Ticket checked in").into_response())
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub name: String,
    pub email: Option<String>,
    pub cpf: Option<String>,
}

pub async fn transfer(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    Json(body): Json<TransferRequest>,
) -> Result<Response, AppError> {
    if body.name.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Recipient name is required".to_string(),
        ));
    }
    let attendee = Attendee {
        name: body.name,
        email: body.email,
        cpf: body.cpf,
    };
    let ticket = state.tickets.transfer(ticket_id, &attendee).await?;
    Ok(success(ticket, "Ticket transferred").into_response())
}
