use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use entrada_server::config::Config;
use entrada_server::gateway::mock::MockPaymentGateway;
use entrada_server::gateway::PaymentGateway;
use entrada_server::notify::{EventPublisher, LogMailer, Mailer, TracingPublisher};
use entrada_server::repo::postgres::{
    PgEventRepository, PgOrderRepository, PgPaymentRepository, PgPromoCodeRepository,
    PgTicketInstanceRepository, PgTicketTypeRepository,
};
use entrada_server::repo::{
    EventRepository, OrderRepository, PaymentRepository, PromoCodeRepository,
    TicketInstanceRepository, TicketTypeRepository,
};
use entrada_server::routes::create_routes;
use entrada_server::services::inventory::InventoryLedger;
use entrada_server::services::orders::OrderService;
use entrada_server::services::promo::PromoService;
use entrada_server::services::reconciler::WebhookReconciler;
use entrada_server::services::sweeper::ReservationSweeper;
use entrada_server::services::tickets::TicketService;
use entrada_server::state::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Arc::new(Config::from_env());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    if config.webhook_token.is_none() {
        tracing::warn!(
            "WEBHOOK_ACCESS_TOKEN is not set; the payment webhook endpoint will reject all deliveries"
        );
    }

    let events: Arc<dyn EventRepository> = Arc::new(PgEventRepository::new(pool.clone()));
    let ticket_types: Arc<dyn TicketTypeRepository> =
        Arc::new(PgTicketTypeRepository::new(pool.clone()));
    let orders: Arc<dyn OrderRepository> = Arc::new(PgOrderRepository::new(pool.clone()));
    let payments: Arc<dyn PaymentRepository> = Arc::new(PgPaymentRepository::new(pool.clone()));
    let instances: Arc<dyn TicketInstanceRepository> =
        Arc::new(PgTicketInstanceRepository::new(pool.clone()));
    let promo_codes: Arc<dyn PromoCodeRepository> =
        Arc::new(PgPromoCodeRepository::new(pool.clone()));

    let gateway: Arc<dyn PaymentGateway> = Arc::new(MockPaymentGateway::new());
    let publisher: Arc<dyn EventPublisher> = Arc::new(TracingPublisher);
    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);

    let ledger = Arc::new(InventoryLedger::new(Arc::clone(&ticket_types)));
    let ticket_service = Arc::new(TicketService::new(Arc::clone(&instances)));
    let promo_service = Arc::new(PromoService::new(
        Arc::clone(&promo_codes),
        Arc::clone(&orders),
    ));
    let order_service = Arc::new(OrderService::new(
        Arc::clone(&orders),
        Arc::clone(&payments),
        Arc::clone(&promo_codes),
        Arc::clone(&ledger),
        Arc::clone(&ticket_service),
        Arc::clone(&promo_service),
        Arc::clone(&gateway),
        Arc::clone(&publisher),
        Arc::clone(&mailer),
        config.service_fee_percent,
    ));
    let reconciler = Arc::new(WebhookReconciler::new(
        Arc::clone(&payments),
        Arc::clone(&orders),
        Arc::clone(&order_service),
        Arc::clone(&ledger),
        Arc::clone(&gateway),
        Arc::clone(&publisher),
        config.webhook_token.clone(),
    ));

    ReservationSweeper::new(
        Arc::clone(&orders),
        Arc::clone(&order_service),
        config.reservation_hold_minutes,
        config.sweep_interval_secs,
    )
    .spawn();

    let state = AppState {
        config: Arc::clone(&config),
        events,
        ticket_types,
        ledger,
        orders: order_service,
        tickets: ticket_service,
        promos: promo_service,
        reconciler,
    };

    let app: Router = create_routes(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
