//! Shared application state handed to every handler.

use std::sync::Arc;

use checkout::{CheckoutOrchestrator, InMemoryPaymentGateway};
use domain::{CartService, InventoryLedger, OrderRecords};
use store::ShopStore;

use crate::config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S: ShopStore> {
    pub store: S,
    pub carts: CartService<S>,
    pub inventory: InventoryLedger<S>,
    pub orders: OrderRecords<S>,
    pub checkout: CheckoutOrchestrator<S, InMemoryPaymentGateway>,
}

impl<S: ShopStore + Clone> AppState<S> {
    /// Wires every service over one store.
    pub fn new(store: S, gateway: InMemoryPaymentGateway, config: &Config) -> Self {
        Self {
            carts: CartService::new(store.clone()),
            inventory: InventoryLedger::new(store.clone()),
            orders: OrderRecords::with_policy(store.clone(), config.order_status_policy),
            checkout: CheckoutOrchestrator::new(store.clone(), gateway)
                .with_currency(&config.payment_currency),
            store,
        }
    }
}

/// Creates the default application state with the in-memory payment gateway.
pub fn create_default_state<S: ShopStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store, InMemoryPaymentGateway::new(), config))
}
