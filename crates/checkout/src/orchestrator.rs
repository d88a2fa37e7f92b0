//! Checkout orchestrator: turns a confirmed cart into an order.

use std::time::Instant;

use common::UserId;
use store::{CheckoutCommit, NewOrder, Order, OrderLineItem, ShopStore, StockMovement};

use crate::confirmation::PaymentConfirmation;
use crate::error::{CheckoutError, Result};
use crate::services::payment::{PaymentGateway, PaymentIntent};

/// Currency used for payment intents unless configured otherwise.
pub const DEFAULT_CURRENCY: &str = "thb";

/// Orchestrates checkout for a cart owner.
///
/// Finalizing an order snapshots the cart, books every line against stock
/// and removes the cart in a single store commit. If any line is short on
/// stock nothing is written and the cart stays in place.
pub struct CheckoutOrchestrator<S, P>
where
    S: ShopStore,
    P: PaymentGateway,
{
    store: S,
    gateway: P,
    currency: String,
}

impl<S, P> CheckoutOrchestrator<S, P>
where
    S: ShopStore,
    P: PaymentGateway,
{
    /// Creates a new orchestrator charging in the default currency.
    pub fn new(store: S, gateway: P) -> Self {
        Self {
            store,
            gateway,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Sets the currency used for payment intents.
    pub fn with_currency(mut self, currency: impl AsRef<str>) -> Self {
        self.currency = currency.as_ref().trim().to_ascii_lowercase();
        self
    }

    /// Returns the payment intent currency.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Returns a reference to the payment gateway.
    pub fn gateway(&self) -> &P {
        &self.gateway
    }

    /// Creates an order from the owner's cart once payment is confirmed.
    #[tracing::instrument(skip(self, confirmation), fields(payment_id = %confirmation.id()))]
    pub async fn finalize_order(
        &self,
        owner_id: UserId,
        confirmation: PaymentConfirmation,
    ) -> Result<Order> {
        metrics::counter!("checkouts_total").increment(1);
        let start = Instant::now();

        let result = self.commit(owner_id, confirmation).await;

        let duration = start.elapsed().as_secs_f64();
        metrics::histogram!("checkout_duration_seconds").record(duration);
        match &result {
            Ok(order) => {
                tracing::info!(
                    order_id = %order.id,
                    total = %order.cart_total,
                    duration,
                    "checkout completed"
                );
            }
            Err(e) => {
                metrics::counter!("checkout_failures_total", "reason" => e.reason()).increment(1);
                tracing::warn!(error = %e, reason = e.reason(), "checkout failed");
            }
        }
        result
    }

    async fn commit(&self, owner_id: UserId, confirmation: PaymentConfirmation) -> Result<Order> {
        let cart = match self.store.get_cart(owner_id).await? {
            Some(cart) if !cart.is_empty() => cart,
            _ => return Err(CheckoutError::EmptyCart),
        };

        let movements = cart
            .items
            .iter()
            .map(|line| StockMovement::Sale {
                product_id: line.product_id,
                count: line.count,
            })
            .collect();

        let order = NewOrder {
            owner_id,
            items: cart.items.iter().map(OrderLineItem::from).collect(),
            cart_total: cart.cart_total,
            external_payment_id: confirmation.id().to_string(),
            amount: confirmation.amount(),
            payment_status: confirmation.status().to_string(),
            currency: confirmation.currency().to_string(),
        };

        let order = self
            .store
            .commit_checkout(CheckoutCommit {
                cart_id: cart.id,
                order,
                movements,
            })
            .await?;
        Ok(order)
    }

    /// Asks the payment gateway for an intent covering the owner's cart.
    #[tracing::instrument(skip(self))]
    pub async fn create_payment_intent(&self, owner_id: UserId) -> Result<PaymentIntent> {
        let cart = match self.store.get_cart(owner_id).await? {
            Some(cart) if !cart.is_empty() => cart,
            _ => return Err(CheckoutError::EmptyCart),
        };

        let amount_minor = cart.cart_total.to_minor_units().ok_or_else(|| {
            CheckoutError::PaymentGateway(format!(
                "Cart total {} is too large to charge",
                cart.cart_total
            ))
        })?;

        let intent = self
            .gateway
            .create_intent(owner_id, amount_minor, &self.currency)
            .await?;
        tracing::info!(intent_id = %intent.id, amount = intent.amount, "payment intent created");
        Ok(intent)
    }
}
