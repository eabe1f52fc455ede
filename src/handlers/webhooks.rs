use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use crate::services::reconciler::WebhookPayload;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

/// Shared-secret header; the query parameter `token` is accepted for
/// providers that can only configure a URL.
pub const WEBHOOK_TOKEN_HEADER: &str = "x-webhook-token";

pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    Json(raw): Json<Value>,
) -> Result<Response, AppError> {
    // Authenticate before touching the payload.
    let provided = headers
        .get(WEBHOOK_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .or_else(|| params.get("token").map(String::as_str));
    state.reconciler.authorize(provided)?;

    let payload: WebhookPayload = serde_json::from_value(raw)
        .map_err(|e| AppError::ValidationError(format!("Malformed webhook payload: {e}")))?;

    let disposition = state.reconciler.process(payload).await?;
    Ok(success(disposition, "Webhook processed").into_response())
}
