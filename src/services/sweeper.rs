//! Periodic expiry of stale unpaid reservations.
//!
//! The only long-lived background task in the system. Orders that never got
//! a payment verdict keep stock reserved; once their hold window lapses the
//! sweep releases the reservation and moves them to `EXPIRED`. Orders with
//! an outstanding gateway payment are resolved by webhooks instead.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::repo::OrderRepository;
use crate::services::orders::OrderService;
use crate::utils::error::AppError;

pub struct ReservationSweeper {
    orders: Arc<dyn OrderRepository>,
    order_service: Arc<OrderService>,
    hold: chrono::Duration,
    interval: Duration,
}

impl ReservationSweeper {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        order_service: Arc<OrderService>,
        hold_minutes: i64,
        interval_secs: u64,
    ) -> Self {
        Self {
            orders,
            order_service,
            hold: chrono::Duration::minutes(hold_minutes),
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// Expires every stale order once. Returns how many were expired.
    pub async fn sweep_once(&self) -> Result<usize, AppError> {
        let cutoff = Utc::now() - self.hold;
        let stale = self.orders.stale_pending(cutoff).await?;
        let mut expired = 0;
        for order in stale {
            match self.order_service.expire(order.id).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::error!(order_id = %order.id, error = %err, "Failed to expire order");
                }
            }
        }
        if expired > 0 {
            tracing::info!(expired, "Reservation sweep released stale holds");
        }
        Ok(expired)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = self.sweep_once().await {
                    tracing::error!(error = %err, "Reservation sweep failed");
                }
            }
        })
    }
}
