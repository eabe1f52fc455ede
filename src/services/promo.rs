//! Promo code validation.
//!
//! `evaluate` is a pure function over already-loaded data, so it can run on
//! every cart edit without side effects. Usage counters move only when an
//! order is confirmed, elsewhere in the checkout/reconciliation path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{DiscountKind, PromoCode};
use crate::repo::{OrderRepository, PromoCodeRepository};
use crate::utils::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromoRejection {
    #[error("Promo code not found")]
    NotFound,
    #[error("Promo code is inactive")]
    Inactive,
    #[error("Promo code is not valid yet")]
    NotYetValid,
    #[error("Promo code has expired")]
    Expired,
    #[error("Promo code usage limit reached")]
    UsageCapReached,
    #[error("You have already used this promo code the maximum number of times")]
    BuyerCapReached,
    #[error("Order value is below the minimum of {0} required by this promo code")]
    BelowMinimumOrder(Decimal),
    #[error("Promo code does not apply to the selected ticket types")]
    TicketNotApplicable,
}

impl From<PromoRejection> for AppError {
    fn from(err: PromoRejection) -> Self {
        match err {
            PromoRejection::NotFound => AppError::NotFound(err.to_string()),
            PromoRejection::UsageCapReached | PromoRejection::BuyerCapReached => {
                AppError::Conflict(err.to_string())
            }
            _ => AppError::ValidationError(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromoQuote {
    pub promo_code_id: Uuid,
    pub discount: Decimal,
    pub final_amount: Decimal,
}

/// Applies every rule of the code against one prospective order. The
/// discount never exceeds the order value, so the final amount never goes
/// negative.
pub fn evaluate(
    promo: &PromoCode,
    now: DateTime<Utc>,
    order_value: Decimal,
    buyer_uses: i64,
    requested_ticket_types: &[Uuid],
) -> Result<PromoQuote, PromoRejection> {
    if !promo.active {
        return Err(PromoRejection::Inactive);
    }
    if let Some(from) = promo.valid_from {
        if now < from {
            return Err(PromoRejection::NotYetValid);
        }
    }
    if let Some(until) = promo.valid_until {
        if now > until {
            return Err(PromoRejection::Expired);
        }
    }
    if let Some(max) = promo.max_uses {
        if promo.current_uses >= max {
            return Err(PromoRejection::UsageCapReached);
        }
    }
    if let Some(per_buyer) = promo.max_uses_per_buyer {
        if buyer_uses >= i64::from(per_buyer) {
            return Err(PromoRejection::BuyerCapReached);
        }
    }
    if let Some(min) = promo.min_order_value {
        if order_value < min {
            return Err(PromoRejection::BelowMinimumOrder(min));
        }
    }
    if let Some(applicable) = &promo.ticket_type_ids {
        if requested_ticket_types
            .iter()
            .any(|id| !applicable.contains(id))
        {
            return Err(PromoRejection::TicketNotApplicable);
        }
    }

    let mut discount = match promo.kind {
        DiscountKind::Percentage => (order_value * promo.value / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        DiscountKind::Fixed => promo.value,
    };
    if let Some(cap) = promo.max_discount {
        discount = discount.min(cap);
    }
    discount = discount.min(order_value);

    Ok(PromoQuote {
        promo_code_id: promo.id,
        discount,
        final_amount: order_value - discount,
    })
}

pub struct PromoService {
    promos: Arc<dyn PromoCodeRepository>,
    orders: Arc<dyn OrderRepository>,
}

impl PromoService {
    pub fn new(promos: Arc<dyn PromoCodeRepository>, orders: Arc<dyn OrderRepository>) -> Self {
        Self { promos, orders }
    }

    /// Side-effect-free quote for a code against a prospective order.
    pub async fn quote(
        &self,
        event_id: Uuid,
        code: &str,
        order_value: Decimal,
        buyer_id: Uuid,
        requested_ticket_types: &[Uuid],
    ) -> Result<(PromoCode, PromoQuote), AppError> {
        let promo = self
            .promos
            .find_by_code(event_id, code)
            .await?
            .ok_or(PromoRejection::NotFound)?;
        let buyer_uses = self
            .orders
            .count_confirmed_with_promo(promo.id, buyer_id)
            .await?;
        let quote = evaluate(&promo, Utc::now(), order_value, buyer_uses, requested_ticket_types)?;
        Ok((promo, quote))
    }
}
