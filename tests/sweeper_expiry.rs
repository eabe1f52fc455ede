//! Expiry sweep over stale unpaid reservations.

mod common;

use common::*;
use entrada_server::models::OrderStatus;
use entrada_server::repo::{OrderRepository, TicketTypeRepository};
use entrada_server::services::sweeper::ReservationSweeper;
use std::sync::Arc;

fn sweeper(app: &TestApp, hold_minutes: i64) -> ReservationSweeper {
    ReservationSweeper::new(
        Arc::clone(&app.orders_repo) as Arc<dyn OrderRepository>,
        Arc::clone(&app.orders),
        hold_minutes,
        3600,
    )
}

#[tokio::test]
async fn stale_pending_order_is_expired_and_its_hold_released() {
    let app = test_app();
    let event = app.seed_event().await;
    let tt = app.seed_ticket_type(event.id, 10000, 10, None).await;

    // A gateway outage strands the order in PENDING with stock held.
    app.gateway.fail_next_call();
    app.orders
        .checkout(
            checkout_command(event.id, tt.id, 4, Some(pix_billing())),
            true,
        )
        .await
        .unwrap_err();

    let expired = sweeper(&app, 0).sweep_once().await.unwrap();
    assert_eq!(expired, 1);

    let pending = app
        .orders_repo
        .stale_pending(chrono::Utc::now() + chrono::Duration::seconds(1))
        .await
        .unwrap();
    assert!(pending.is_empty());

    let current = app.ticket_types.find(tt.id).await.unwrap().unwrap();
    assert_eq!(current.quantity_reserved, 0);
    assert_eq!(current.quantity_sold, 0);
    assert_eq!(current.available(), 10);
}

#[tokio::test]
async fn fresh_pending_orders_are_left_alone() {
    let app = test_app();
    let event = app.seed_event().await;
    let tt = app.seed_ticket_type(event.id, 10000, 10, None).await;

    app.gateway.fail_next_call();
    app.orders
        .checkout(
            checkout_command(event.id, tt.id, 2, Some(pix_billing())),
            true,
        )
        .await
        .unwrap_err();

    let expired = sweeper(&app, 30).sweep_once().await.unwrap();
    assert_eq!(expired, 0);

    let current = app.ticket_types.find(tt.id).await.unwrap().unwrap();
    assert_eq!(current.quantity_reserved, 2);
}

#[tokio::test]
async fn orders_awaiting_a_payment_verdict_are_not_swept() {
    let app = test_app();
    let event = app.seed_event().await;
    let tt = app.seed_ticket_type(event.id, 10000, 10, None).await;

    // Payment created successfully: the order sits in PROCESSING and belongs
    // to the webhook reconciler, not the sweep.
    let outcome = app
        .orders
        .checkout(
            checkout_command(event.id, tt.id, 2, Some(pix_billing())),
            true,
        )
        .await
        .unwrap();
    assert_eq!(outcome.order.status, OrderStatus::Processing);

    let expired = sweeper(&app, 0).sweep_once().await.unwrap();
    assert_eq!(expired, 0);

    let order = app.orders_repo.find(outcome.order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
}
