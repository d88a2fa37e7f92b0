//! Order record accessors.

use std::str::FromStr;

use common::{OrderId, OrderStatus, UserId};
use store::{Order, OrderDetail, OrderQuery, ShopStore};
use tracing::info;

use crate::error::DomainError;

/// Decides which lifecycle changes `set_order_status` accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Any status, including labels outside the lifecycle table, may
    /// replace any other.
    #[default]
    Unrestricted,

    /// Only moves in the order status transition table are accepted.
    Enforced,
}

impl StatusPolicy {
    /// Returns true if the policy allows moving from `from` to `to`.
    /// Re-setting the current status is always allowed.
    pub fn permits(self, from: &OrderStatus, to: &OrderStatus) -> bool {
        match self {
            StatusPolicy::Unrestricted => true,
            StatusPolicy::Enforced => from == to || from.can_transition_to(to),
        }
    }

    /// Returns the policy name as written in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusPolicy::Unrestricted => "unrestricted",
            StatusPolicy::Enforced => "enforced",
        }
    }
}

impl FromStr for StatusPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unrestricted" => Ok(StatusPolicy::Unrestricted),
            "enforced" => Ok(StatusPolicy::Enforced),
            other => Err(format!("Unknown status policy: {other}")),
        }
    }
}

/// Read access to orders plus the one permitted mutation, the lifecycle
/// status.
#[derive(Clone)]
pub struct OrderRecords<S: ShopStore> {
    store: S,
    policy: StatusPolicy,
}

impl<S: ShopStore> OrderRecords<S> {
    /// Creates order records with the default `Unrestricted` policy.
    pub fn new(store: S) -> Self {
        Self::with_policy(store, StatusPolicy::default())
    }

    /// Creates order records with an explicit status policy.
    pub fn with_policy(store: S, policy: StatusPolicy) -> Self {
        Self { store, policy }
    }

    /// Returns the active status policy.
    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    /// Lists one user's orders with nested product data, in ID order.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders_for_user(
        &self,
        owner_id: UserId,
    ) -> Result<Vec<OrderDetail>, DomainError> {
        Ok(self.store.list_orders(OrderQuery::for_owner(owner_id)).await?)
    }

    /// Lists every order with owner contact fields projected.
    #[tracing::instrument(skip(self))]
    pub async fn list_all_orders(&self) -> Result<Vec<OrderDetail>, DomainError> {
        Ok(self
            .store
            .list_orders(OrderQuery::new().with_owner_contact())
            .await?)
    }

    /// Loads a single order.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_id))
    }

    /// Sets an order's lifecycle status, subject to the status policy.
    #[tracing::instrument(skip(self))]
    pub async fn set_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, DomainError> {
        let current = self.get_order(order_id).await?;
        let from = current.order_status.clone();

        if !self.policy.permits(&from, &status) {
            return Err(DomainError::InvalidStatusTransition { from, to: status });
        }
        if from == status {
            return Ok(current);
        }

        let label = status.metric_label();
        let order = self
            .store
            .update_order_status(order_id, status)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_id))?;

        metrics::counter!("order_status_updates_total", "status" => label).increment(1);
        info!(%from, to = %order.order_status, "Order status updated");
        Ok(order)
    }
}
