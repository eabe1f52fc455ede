//! Webhook reconciliation: duplicates, installments, failures, refunds.

mod common;

use common::*;
use entrada_server::models::{DiscountKind, OrderStatus, PaymentStatus, TicketStatus};
use entrada_server::repo::{
    OrderRepository, PaymentRepository, PromoCodeRepository, TicketTypeRepository,
};
use entrada_server::services::orders::CheckoutOutcome;
use entrada_server::services::reconciler::{
    WebhookDisposition, WebhookEventType, WebhookPayload, WebhookPaymentData,
};
use std::sync::Arc;
use uuid::Uuid;

fn payload(
    event: WebhookEventType,
    provider_id: &str,
    external_reference: Option<Uuid>,
    installment_number: Option<i32>,
) -> WebhookPayload {
    WebhookPayload {
        event,
        payment: WebhookPaymentData {
            id: provider_id.to_string(),
            status: None,
            value: None,
            due_date: None,
            external_reference: external_reference.map(|id| id.to_string()),
            installment_number,
            installment: installment_number.map(|_| "ins_group_1".to_string()),
        },
    }
}

async fn paid_checkout(app: &TestApp, quantity: i32) -> (CheckoutOutcome, Uuid) {
    let event = app.seed_event().await;
    let tt = app.seed_ticket_type(event.id, 10000, 50, None).await;
    let outcome = app
        .orders
        .checkout(
            checkout_command(event.id, tt.id, quantity, Some(pix_billing())),
            true,
        )
        .await
        .unwrap();
    (outcome, tt.id)
}

#[tokio::test]
async fn duplicate_confirmation_webhooks_mint_once() {
    let app = test_app();
    let (outcome, tt_id) = paid_checkout(&app, 3).await;
    let provider_id = outcome.payment.as_ref().unwrap().provider_payment_id.clone();

    let first = app
        .reconciler
        .process(payload(WebhookEventType::PaymentReceived, &provider_id, None, None))
        .await
        .unwrap();
    assert_eq!(first, WebhookDisposition::Processed);

    let second = app
        .reconciler
        .process(payload(WebhookEventType::PaymentReceived, &provider_id, None, None))
        .await
        .unwrap();
    assert_eq!(second, WebhookDisposition::AlreadyApplied);

    let order = app.orders_repo.find(outcome.order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);

    let tickets = app.tickets.list_for_order(order.id).await.unwrap();
    assert_eq!(tickets.len(), 3);

    // Sold moved exactly once, reservation fully consumed.
    let tt = app.ticket_types.find(tt_id).await.unwrap().unwrap();
    assert_eq!(tt.quantity_sold, 3);
    assert_eq!(tt.quantity_reserved, 0);
}

#[tokio::test]
async fn concurrent_confirmations_apply_side_effects_once() {
    let app = test_app();
    let (outcome, tt_id) = paid_checkout(&app, 2).await;
    let provider_id = outcome.payment.as_ref().unwrap().provider_payment_id.clone();

    let reconciler_a = Arc::clone(&app.reconciler);
    let reconciler_b = Arc::clone(&app.reconciler);
    let payload_a = payload(WebhookEventType::PaymentConfirmed, &provider_id, None, None);
    let payload_b = payload_a.clone();

    let (a, b) = tokio::join!(
        tokio::spawn(async move { reconciler_a.process(payload_a).await }),
        tokio::spawn(async move { reconciler_b.process(payload_b).await }),
    );
    let dispositions = [a.unwrap().unwrap(), b.unwrap().unwrap()];
    let processed = dispositions
        .iter()
        .filter(|d| **d == WebhookDisposition::Processed)
        .count();
    assert_eq!(processed, 1, "only one delivery may claim the confirmation");

    assert_eq!(app.tickets.list_for_order(outcome.order.id).await.unwrap().len(), 2);
    let tt = app.ticket_types.find(tt_id).await.unwrap().unwrap();
    assert_eq!(tt.quantity_sold, 2);
}

#[tokio::test]
async fn installment_plan_mints_on_first_installment_only() {
    let app = test_app();
    let event = app.seed_event().await;
    let tt = app.seed_ticket_type(event.id, 30000, 50, None).await;
    let outcome = app
        .orders
        .checkout(
            checkout_command(event.id, tt.id, 2, Some(card_billing(3))),
            true,
        )
        .await
        .unwrap();

    // The provider notifies once per installment, each with its own
    // transaction id; only the order id ties them back.
    let mut dispositions = Vec::new();
    for installment in 1..=3 {
        let disposition = app
            .reconciler
            .process(payload(
                WebhookEventType::PaymentConfirmed,
                &format!("pay_installment_{installment}"),
                Some(outcome.order.id),
                Some(installment),
            ))
            .await
            .unwrap();
        dispositions.push(disposition);
    }

    assert_eq!(dispositions[0], WebhookDisposition::Processed);
    assert_eq!(dispositions[1], WebhookDisposition::AlreadyApplied);
    assert_eq!(dispositions[2], WebhookDisposition::AlreadyApplied);

    // Exactly one set of instances despite three deliveries.
    assert_eq!(app.tickets.list_for_order(outcome.order.id).await.unwrap().len(), 2);
    let tt = app.ticket_types.find(tt.id).await.unwrap().unwrap();
    assert_eq!(tt.quantity_sold, 2);
    assert_eq!(tt.quantity_reserved, 0);
}

#[tokio::test]
async fn overdue_webhook_cancels_order_and_releases_stock() {
    let app = test_app();
    let (outcome, tt_id) = paid_checkout(&app, 2).await;
    let provider_id = outcome.payment.as_ref().unwrap().provider_payment_id.clone();

    let disposition = app
        .reconciler
        .process(payload(WebhookEventType::PaymentOverdue, &provider_id, None, None))
        .await
        .unwrap();
    assert_eq!(disposition, WebhookDisposition::Processed);

    let order = app.orders_repo.find(outcome.order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);

    let payment = app.payments.find_by_provider_id(&provider_id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);

    let tt = app.ticket_types.find(tt_id).await.unwrap().unwrap();
    assert_eq!(tt.quantity_reserved, 0);
    assert_eq!(tt.quantity_sold, 0);

    // A second overdue delivery is a no-op.
    let again = app
        .reconciler
        .process(payload(WebhookEventType::PaymentOverdue, &provider_id, None, None))
        .await
        .unwrap();
    assert_eq!(again, WebhookDisposition::AlreadyApplied);
    let tt = app.ticket_types.find(tt_id).await.unwrap().unwrap();
    assert_eq!(tt.quantity_reserved, 0);
}

#[tokio::test]
async fn refund_is_recorded_without_reversing_tickets() {
    let app = test_app();
    let (outcome, _) = paid_checkout(&app, 1).await;
    let provider_id = outcome.payment.as_ref().unwrap().provider_payment_id.clone();

    app.reconciler
        .process(payload(WebhookEventType::PaymentReceived, &provider_id, None, None))
        .await
        .unwrap();

    let disposition = app
        .reconciler
        .process(payload(WebhookEventType::PaymentRefunded, &provider_id, None, None))
        .await
        .unwrap();
    assert_eq!(disposition, WebhookDisposition::Recorded);

    let payment = app.payments.find_by_provider_id(&provider_id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Refunded);

    // Refund handling is an explicit separate operation; instances stand.
    let order = app.orders_repo.find(outcome.order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
    let tickets = app.tickets.list_for_order(order.id).await.unwrap();
    assert!(tickets.iter().all(|t| t.status == TicketStatus::Active));
}

#[tokio::test]
async fn unknown_event_type_is_recorded_and_acknowledged() {
    let app = test_app();
    let (outcome, _) = paid_checkout(&app, 1).await;
    let provider_id = outcome.payment.as_ref().unwrap().provider_payment_id.clone();
    let before = app.payments.find_by_provider_id(&provider_id).await.unwrap().unwrap();

    let disposition = app
        .reconciler
        .process(payload(WebhookEventType::Unknown, &provider_id, None, None))
        .await
        .unwrap();
    assert_eq!(disposition, WebhookDisposition::Recorded);

    let after = app.payments.find_by_provider_id(&provider_id).await.unwrap().unwrap();
    assert_eq!(after.status, before.status);
}

#[tokio::test]
async fn unmatched_webhook_is_acknowledged_not_errored() {
    let app = test_app();
    let disposition = app
        .reconciler
        .process(payload(
            WebhookEventType::PaymentReceived,
            "pay_nobody_knows",
            Some(Uuid::new_v4()),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(disposition, WebhookDisposition::Unmatched);
}

#[tokio::test]
async fn explicit_sync_applies_provider_state() {
    let app = test_app();
    let (outcome, tt_id) = paid_checkout(&app, 2).await;
    let provider_id = outcome.payment.as_ref().unwrap().provider_payment_id.clone();

    app.gateway.set_payment_status(&provider_id, "RECEIVED");
    let disposition = app.reconciler.sync_order(outcome.order.id).await.unwrap();
    assert_eq!(disposition, WebhookDisposition::Processed);

    let order = app.orders_repo.find(outcome.order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
    let tt = app.ticket_types.find(tt_id).await.unwrap().unwrap();
    assert_eq!(tt.quantity_sold, 2);
}

#[tokio::test]
async fn promo_usage_is_counted_once_per_confirmed_order() {
    let app = test_app();
    let event = app.seed_event().await;
    let tt = app.seed_ticket_type(event.id, 10000, 50, None).await;
    let promo = app
        .seed_promo(event.id, "VIPDESC", DiscountKind::Percentage, 1000)
        .await;

    let mut cmd = checkout_command(event.id, tt.id, 1, Some(pix_billing()));
    cmd.promo_code = Some("VIPDESC".to_string());
    let outcome = app.orders.checkout(cmd, true).await.unwrap();
    let provider_id = outcome.payment.as_ref().unwrap().provider_payment_id.clone();

    // Validation alone never consumed a use.
    assert_eq!(app.promo_codes.find(promo.id).await.unwrap().unwrap().current_uses, 0);

    for _ in 0..2 {
        app.reconciler
            .process(payload(WebhookEventType::PaymentReceived, &provider_id, None, None))
            .await
            .unwrap();
    }
    assert_eq!(app.promo_codes.find(promo.id).await.unwrap().unwrap().current_uses, 1);
}
