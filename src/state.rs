use std::sync::Arc;

use crate::config::Config;
use crate::repo::{EventRepository, TicketTypeRepository};
use crate::services::inventory::InventoryLedger;
use crate::services::orders::OrderService;
use crate::services::promo::PromoService;
use crate::services::reconciler::WebhookReconciler;
use crate::services::tickets::TicketService;

/// Shared handler state: the core services plus the repositories handlers
/// touch directly.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub events: Arc<dyn EventRepository>,
    pub ticket_types: Arc<dyn TicketTypeRepository>,
    pub ledger: Arc<InventoryLedger>,
    pub orders: Arc<OrderService>,
    pub tickets: Arc<TicketService>,
    pub promos: Arc<PromoService>,
    pub reconciler: Arc<WebhookReconciler>,
}
