use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{events, health_check, orders, promos, ticket_types, tickets, webhooks};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", post(events::create_event))
        .route("/events/:event_id", get(events::get_event))
        .route(
            "/events/:event_id/ticket-types",
            post(ticket_types::create_ticket_type),
        )
        .route(
            "/ticket-types/:ticket_type_id",
            patch(ticket_types::update_ticket_type),
        )
        .route(
            "/ticket-types/:ticket_type_id/availability",
            get(ticket_types::availability),
        )
        .route("/checkout", post(orders::checkout))
        .route("/orders/:order_id", get(orders::get_order))
        .route("/orders/:order_id/cancel", post(orders::cancel_order))
        .route("/orders/:order_id/sync", post(orders::sync_order))
        .route("/orders/:order_id/tickets", get(orders::order_tickets))
        .route("/promo-codes/validate", post(promos::validate_promo))
        .route("/tickets/check-in", post(tickets::check_in))
        .route("/tickets/:ticket_id/transfer", post(tickets::transfer))
        .route("/webhooks/payments", post(webhooks::payment_webhook))
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
        .with_state(state)
}
