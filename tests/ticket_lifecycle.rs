//! Ticket instance redemption: check-in, transfer, cancellation.

mod common;

use common::*;
use entrada_server::models::{Attendee, TicketStatus};
use entrada_server::services::tickets::CheckInRequest;
use entrada_server::utils::error::AppError;
use uuid::Uuid;

async fn minted_ticket(app: &TestApp) -> entrada_server::models::TicketInstance {
    let event = app.seed_event().await;
    let tt = app.seed_ticket_type(event.id, 0, 10, None).await;
    let outcome = app
        .orders
        .checkout(checkout_command(event.id, tt.id, 1, None), true)
        .await
        .unwrap();
    outcome.tickets.into_iter().next().unwrap()
}

fn check_in(code: &str) -> CheckInRequest {
    CheckInRequest {
        code: code.to_string(),
        operator_id: Uuid::new_v4(),
        location: Some("Portão A".to_string()),
        notes: None,
    }
}

#[tokio::test]
async fn check_in_succeeds_once_then_conflicts() {
    let app = test_app();
    let ticket = minted_ticket(&app).await;

    let checked = app.tickets.check_in(&check_in(&ticket.code)).await.unwrap();
    assert_eq!(checked.status, TicketStatus::CheckedIn);
    assert!(checked.checked_in_at.is_some());
    assert_eq!(checked.check_in_location.as_deref(), Some("Portão A"));

    // Idempotency is a conflict, not a silent success.
    let err = app.tickets.check_in(&check_in(&ticket.code)).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn unknown_code_is_not_found() {
    let app = test_app();
    let err = app.tickets.check_in(&check_in("ETK-DOESNOTEXIST")).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn transfer_records_prior_holder_and_keeps_status() {
    let app = test_app();
    let ticket = minted_ticket(&app).await;

    let recipient = Attendee {
        name: "Bruno Lima".to_string(),
        email: Some("bruno@example.com".to_string()),
        cpf: None,
    };
    let transferred = app.tickets.transfer(ticket.id, &recipient).await.unwrap();

    assert_eq!(transferred.status, TicketStatus::Active);
    assert_eq!(transferred.attendee_name.as_deref(), Some("Bruno Lima"));
    assert_eq!(transferred.transferred_from.as_deref(), Some("unassigned"));
    assert!(transferred.transferred_at.is_some());

    // Still redeemable by the new holder.
    let checked = app.tickets.check_in(&check_in(&ticket.code)).await.unwrap();
    assert_eq!(checked.status, TicketStatus::CheckedIn);
}

#[tokio::test]
async fn checked_in_ticket_rejects_transfer() {
    let app = test_app();
    let ticket = minted_ticket(&app).await;
    app.tickets.check_in(&check_in(&ticket.code)).await.unwrap();

    let recipient = Attendee {
        name: "Clara Dias".to_string(),
        email: None,
        cpf: None,
    };
    let err = app.tickets.transfer(ticket.id, &recipient).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn cancelled_ticket_rejects_check_in_and_transfer() {
    let app = test_app();
    let ticket = minted_ticket(&app).await;
    let cancelled = app.tickets.cancel(ticket.id).await.unwrap();
    assert_eq!(cancelled.status, TicketStatus::Cancelled);

    let err = app.tickets.check_in(&check_in(&ticket.code)).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let recipient = Attendee {
        name: "Davi Rocha".to_string(),
        email: None,
        cpf: None,
    };
    let err = app.tickets.transfer(ticket.id, &recipient).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Cancellation is terminal.
    let err = app.tickets.cancel(ticket.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn attendee_data_flows_onto_minted_instances() {
    let app = test_app();
    let event = app.seed_event().await;
    let tt = app.seed_ticket_type(event.id, 0, 10, None).await;

    let mut cmd = checkout_command(event.id, tt.id, 2, None);
    cmd.items[0].attendees = vec![
        Attendee {
            name: "Elisa Prado".to_string(),
            email: Some("elisa@example.com".to_string()),
            cpf: Some("11122233344".to_string()),
        },
        Attendee {
            name: "Fabio Nunes".to_string(),
            email: None,
            cpf: None,
        },
    ];
    let outcome = app.orders.checkout(cmd, true).await.unwrap();

    let names: Vec<Option<String>> = outcome
        .tickets
        .iter()
        .map(|t| t.attendee_name.clone())
        .collect();
    assert!(names.contains(&Some("Elisa Prado".to_string())));
    assert!(names.contains(&Some("Fabio Nunes".to_string())));
}
