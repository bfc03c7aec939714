//! Loyalty program gateway.
//!
//! Orders earn points at commit time. The external program is best-effort
//! by contract: a committed order never rolls back because the loyalty
//! backend was down, so checkout logs failures and moves on. Points are
//! also mirrored onto the customer row so balances survive a gateway
//! outage.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sofra_core::{CustomerId, OrderId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoyaltyError {
    #[error("loyalty backend failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait LoyaltyGateway: Send + Sync {
    /// Credits points for a committed order.
    async fn award_points(
        &self,
        customer_id: &CustomerId,
        order_id: OrderId,
        points: i64,
    ) -> Result<(), LoyaltyError>;

    /// Optional nudge appended to the order confirmation, e.g. a favorite
    /// restaurant worth reordering from.
    async fn suggest_favorite(&self, customer_id: &CustomerId) -> Result<Option<String>, LoyaltyError>;
}

/// One point per whole dinar of order total.
pub fn points_for(total: Decimal) -> i64 {
    total.trunc().to_i64().unwrap_or(0).max(0)
}

/// Stand-in when no loyalty program is wired up.
pub struct NoopLoyaltyGateway;

#[async_trait]
impl LoyaltyGateway for NoopLoyaltyGateway {
    async fn award_points(
        &self,
        customer_id: &CustomerId,
        order_id: OrderId,
        points: i64,
    ) -> Result<(), LoyaltyError> {
        tracing::debug!(
            customer = %customer_id.as_str(),
            order = order_id.0,
            points,
            "loyalty gateway disabled, award skipped"
        );
        Ok(())
    }

    async fn suggest_favorite(&self, _customer_id: &CustomerId) -> Result<Option<String>, LoyaltyError> {
        Ok(None)
    }
}

/// Test double that records awards and plays back a scripted favorite.
#[derive(Default)]
pub struct RecordingLoyaltyGateway {
    awards: std::sync::Mutex<Vec<(CustomerId, OrderId, i64)>>,
    favorite: std::sync::Mutex<Option<String>>,
}

impl RecordingLoyaltyGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_favorite(self, name: impl Into<String>) -> Self {
        *self.favorite.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            Some(name.into());
        self
    }

    pub fn awards(&self) -> Vec<(CustomerId, OrderId, i64)> {
        self.awards.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl LoyaltyGateway for RecordingLoyaltyGateway {
    async fn award_points(
        &self,
        customer_id: &CustomerId,
        order_id: OrderId,
        points: i64,
    ) -> Result<(), LoyaltyError> {
        self.awards
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((customer_id.clone(), order_id, points));
        Ok(())
    }

    async fn suggest_favorite(&self, _customer_id: &CustomerId) -> Result<Option<String>, LoyaltyError> {
        Ok(self.favorite.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::points_for;

    #[test]
    fn points_truncate_to_whole_dinars() {
        assert_eq!(points_for("12.90".parse::<Decimal>().expect("decimal")), 12);
        assert_eq!(points_for("0.75".parse::<Decimal>().expect("decimal")), 0);
        assert_eq!(points_for(Decimal::ZERO), 0);
    }
}
