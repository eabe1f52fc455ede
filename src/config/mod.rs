use rust_decimal::Decimal;
use std::env;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Shared secret expected on every inbound payment webhook. When unset,
    /// the webhook endpoint rejects everything (fails closed).
    pub webhook_token: Option<String>,
    /// Service fee charged on the discounted subtotal, in percent.
    pub service_fee_percent: Decimal,
    /// How long an unpaid order may hold its reservation before the sweep
    /// expires it.
    pub reservation_hold_minutes: i64,
    pub sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/entrada".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3001),
            webhook_token: env::var("WEBHOOK_ACCESS_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            service_fee_percent: env::var("SERVICE_FEE_PERCENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| Decimal::from(10)),
            reservation_hold_minutes: env::var("RESERVATION_HOLD_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        }
    }
}
