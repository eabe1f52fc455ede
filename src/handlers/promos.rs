use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

/// Side-effect-free quote; buyers may call this on every cart edit.
#[derive(Debug, Deserialize)]
pub struct ValidatePromoRequest {
    pub event_id: Uuid,
    pub code: String,
    pub order_value: Decimal,
    pub buyer_id: Uuid,
    #[serde(default)]
    pub ticket_type_ids: Vec<Uuid>,
}

pub async fn validate_promo(
    State(state): State<AppState>,
    Json(body): Json<ValidatePromoRequest>,
) -> Result<Response, AppError> {
    let (_, quote) = state
        .promos
        .quote(
            body.event_id,
            &body.code,
            body.order_value,
            body.buyer_id,
            &body.ticket_type_ids,
        )
        .await?;
    Ok(success(quote, "Promo code is valid").into_response())
}
