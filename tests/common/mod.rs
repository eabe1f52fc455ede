#![allow(dead_code)]

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use entrada_server::config::Config;
use entrada_server::gateway::mock::MockPaymentGateway;
use entrada_server::gateway::PaymentGateway;
use entrada_server::models::{
    BillingMethod, DiscountKind, Event, PromoCode, TicketType,
};
use entrada_server::notify::{DomainEvent, EventPublisher, LogMailer, MailFuture, Mailer};
use entrada_server::repo::memory::{
    InMemoryEventRepository, InMemoryOrderRepository, InMemoryPaymentRepository,
    InMemoryPromoCodeRepository, InMemoryTicketInstanceRepository, InMemoryTicketTypeRepository,
};
use entrada_server::repo::{
    EventRepository, OrderRepository, PaymentRepository, PromoCodeRepository,
    TicketInstanceRepository, TicketTypeRepository,
};
use entrada_server::services::inventory::InventoryLedger;
use entrada_server::services::orders::{BillingInfo, BuyerInfo, CheckoutCommand, CheckoutItem, OrderService};
use entrada_server::services::promo::PromoService;
use entrada_server::services::reconciler::WebhookReconciler;
use entrada_server::services::tickets::TicketService;
use entrada_server::state::AppState;

pub const WEBHOOK_TOKEN: &str = "whk-test-secret";

/// Captures published domain events for assertions.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: &DomainEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Mailer whose deliveries always fail, for the bookkeeping tests.
pub struct FailingMailer;

impl Mailer for FailingMailer {
    fn send_order_confirmation(
        &self,
        _order: &entrada_server::models::Order,
        _tickets: &[entrada_server::models::TicketInstance],
    ) -> MailFuture {
        Box::pin(async { Err("smtp unavailable".to_string()) })
    }
}

pub struct TestApp {
    pub events: Arc<InMemoryEventRepository>,
    pub ticket_types: Arc<InMemoryTicketTypeRepository>,
    pub orders_repo: Arc<InMemoryOrderRepository>,
    pub payments: Arc<InMemoryPaymentRepository>,
    pub instances: Arc<InMemoryTicketInstanceRepository>,
    pub promo_codes: Arc<InMemoryPromoCodeRepository>,
    pub gateway: Arc<MockPaymentGateway>,
    pub publisher: Arc<RecordingPublisher>,
    pub ledger: Arc<InventoryLedger>,
    pub tickets: Arc<TicketService>,
    pub promos: Arc<PromoService>,
    pub orders: Arc<OrderService>,
    pub reconciler: Arc<WebhookReconciler>,
}

pub fn test_app() -> TestApp {
    build_app(Arc::new(LogMailer), Some(WEBHOOK_TOKEN.to_string()))
}

pub fn test_app_with_mailer(mailer: Arc<dyn Mailer>) -> TestApp {
    build_app(mailer, Some(WEBHOOK_TOKEN.to_string()))
}

pub fn test_app_without_webhook_token() -> TestApp {
    build_app(Arc::new(LogMailer), None)
}

fn build_app(mailer: Arc<dyn Mailer>, webhook_token: Option<String>) -> TestApp {
    let events = Arc::new(InMemoryEventRepository::new());
    let ticket_types = Arc::new(InMemoryTicketTypeRepository::new());
    let orders_repo = Arc::new(InMemoryOrderRepository::new());
    let payments = Arc::new(InMemoryPaymentRepository::new());
    let instances = Arc::new(InMemoryTicketInstanceRepository::new());
    let promo_codes = Arc::new(InMemoryPromoCodeRepository::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let publisher = Arc::new(RecordingPublisher::default());

    let ledger = Arc::new(InventoryLedger::new(
        Arc::clone(&ticket_types) as Arc<dyn TicketTypeRepository>
    ));
    let tickets = Arc::new(TicketService::new(
        Arc::clone(&instances) as Arc<dyn TicketInstanceRepository>
    ));
    let promos = Arc::new(PromoService::new(
        Arc::clone(&promo_codes) as Arc<dyn PromoCodeRepository>,
        Arc::clone(&orders_repo) as Arc<dyn OrderRepository>,
    ));
    let orders = Arc::new(OrderService::new(
        Arc::clone(&orders_repo) as Arc<dyn OrderRepository>,
        Arc::clone(&payments) as Arc<dyn PaymentRepository>,
        Arc::clone(&promo_codes) as Arc<dyn PromoCodeRepository>,
        Arc::clone(&ledger),
        Arc::clone(&tickets),
        Arc::clone(&promos),
        Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
        Arc::clone(&publisher) as Arc<dyn EventPublisher>,
        mailer,
        Decimal::from(10),
    ));
    let reconciler = Arc::new(WebhookReconciler::new(
        Arc::clone(&payments) as Arc<dyn PaymentRepository>,
        Arc::clone(&orders_repo) as Arc<dyn OrderRepository>,
        Arc::clone(&orders),
        Arc::clone(&ledger),
        Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
        Arc::clone(&publisher) as Arc<dyn EventPublisher>,
        webhook_token,
    ));

    TestApp {
        events,
        ticket_types,
        orders_repo,
        payments,
        instances,
        promo_codes,
        gateway,
        publisher,
        ledger,
        tickets,
        promos,
        orders,
        reconciler,
    }
}

impl TestApp {
    pub fn state(&self, webhook_token: Option<String>) -> AppState {
        AppState {
            config: Arc::new(Config {
                database_url: String::new(),
                port: 0,
                webhook_token,
                service_fee_percent: Decimal::from(10),
                reservation_hold_minutes: 30,
                sweep_interval_secs: 60,
            }),
            events: Arc::clone(&self.events) as Arc<dyn EventRepository>,
            ticket_types: Arc::clone(&self.ticket_types) as Arc<dyn TicketTypeRepository>,
            ledger: Arc::clone(&self.ledger),
            orders: Arc::clone(&self.orders),
            tickets: Arc::clone(&self.tickets),
            promos: Arc::clone(&self.promos),
            reconciler: Arc::clone(&self.reconciler),
        }
    }

    pub async fn seed_event(&self) -> Event {
        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            organizer_id: Uuid::new_v4(),
            title: "Festival de Inverno".to_string(),
            description: None,
            location: "Arena Central".to_string(),
            start_time: now + chrono::Duration::days(30),
            end_time: Some(now + chrono::Duration::days(31)),
            created_at: now,
            updated_at: now,
        };
        self.events.insert(&event).await.unwrap();
        event
    }

    pub async fn seed_ticket_type(
        &self,
        event_id: Uuid,
        price_cents: i64,
        total: i32,
        half_price_quantity: Option<i32>,
    ) -> TicketType {
        let now = Utc::now();
        let ticket_type = TicketType {
            id: Uuid::new_v4(),
            event_id,
            name: "Pista".to_string(),
            description: None,
            price: Decimal::new(price_cents, 2),
            total_quantity: total,
            quantity_sold: 0,
            quantity_reserved: 0,
            half_price_quantity,
            half_price_sold: 0,
            half_price_reserved: 0,
            min_per_order: 1,
            max_per_order: 10,
            sales_start: now - chrono::Duration::hours(1),
            sales_end: now + chrono::Duration::days(7),
            visible: true,
            created_at: now,
            updated_at: now,
        };
        self.ticket_types.insert(&ticket_type).await.unwrap();
        ticket_type
    }

    pub async fn seed_promo(
        &self,
        event_id: Uuid,
        code: &str,
        kind: DiscountKind,
        value_cents: i64,
    ) -> PromoCode {
        let now = Utc::now();
        let promo = PromoCode {
            id: Uuid::new_v4(),
            event_id,
            code: code.to_string(),
            kind,
            value: Decimal::new(value_cents, 2),
            max_uses: None,
            max_uses_per_buyer: None,
            current_uses: 0,
            valid_from: None,
            valid_until: None,
            min_order_value: None,
            max_discount: None,
            ticket_type_ids: None,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.promo_codes.insert(&promo).await.unwrap();
        promo
    }
}

pub fn buyer() -> BuyerInfo {
    BuyerInfo {
        id: Uuid::new_v4(),
        name: "Ana Souza".to_string(),
        email: "ana@example.com".to_string(),
        cpf: "12345678901".to_string(),
    }
}

pub fn pix_billing() -> BillingInfo {
    BillingInfo {
        method: BillingMethod::Pix,
        installments: None,
        due_date: None,
    }
}

pub fn card_billing(installments: i32) -> BillingInfo {
    BillingInfo {
        method: BillingMethod::Card,
        installments: Some(installments),
        due_date: None,
    }
}

pub fn checkout_command(
    event_id: Uuid,
    ticket_type_id: Uuid,
    quantity: i32,
    billing: Option<BillingInfo>,
) -> CheckoutCommand {
    CheckoutCommand {
        event_id,
        buyer: buyer(),
        items: vec![CheckoutItem {
            ticket_type_id,
            quantity,
            half_price: false,
            attendees: vec![],
        }],
        promo_code: None,
        billing,
        split: vec![],
    }
}

/// Lets fire-and-forget tasks (email dispatch) run before asserting on
/// their bookkeeping.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}
