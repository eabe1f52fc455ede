use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::Event;
use crate::repo::EventRepository;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub organizer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

pub async fn create_event(
    State(state): State<AppState>,
    Json(body): Json<CreateEventRequest>,
) -> Result<Response, AppError> {
    if body.title.trim().is_empty() {
        return Err(AppError::ValidationError("Title is required".to_string()));
    }
    if let Some(end) = body.end_time {
        if end <= body.start_time {
            return Err(AppError::ValidationError(
                "Event must end after it starts".to_string(),
            ));
        }
    }

    let now = Utc::now();
    let event = Event {
        id: Uuid::new_v4(),
        organizer_id: body.organizer_id,
        title: body.title,
        description: body.description,
        location: body.location,
        start_time: body.start_time,
        end_time: body.end_time,
        created_at: now,
        updated_at: now,
    };
    state.events.insert(&event).await?;

    tracing::info!(event_id = %event.id, organizer_id = %event.organizer_id, "Event created");
    Ok(created(event, "Event created").into_response())
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = state
        .events
        .find(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {event_id} not found")))?;
    Ok(success(event, "Event fetched").into_response())
}
