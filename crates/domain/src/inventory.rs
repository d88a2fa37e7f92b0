//! Inventory ledger: per-product available quantity and cumulative sales.

use common::ProductId;
use store::{Product, ShopStore, StockMovement};
use tracing::info;

use crate::error::DomainError;

/// Reads and moves product stock.
///
/// Mutations go through the store's conditional stock update, so a
/// decrement can never drive a quantity negative even under concurrent
/// callers.
#[derive(Clone)]
pub struct InventoryLedger<S: ShopStore> {
    store: S,
}

impl<S: ShopStore> InventoryLedger<S> {
    /// Creates a new ledger over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the current available quantity of a product.
    pub async fn available(&self, product_id: ProductId) -> Result<i32, DomainError> {
        self.store
            .get_product(product_id)
            .await?
            .map(|p| p.quantity)
            .ok_or_else(|| DomainError::not_found("Product", product_id))
    }

    /// Returns true if `count` units of the product are available.
    pub async fn check_availability(
        &self,
        product_id: ProductId,
        count: i32,
    ) -> Result<bool, DomainError> {
        Ok(self.available(product_id).await? >= count)
    }

    /// Sells `count` units: quantity goes down and `sold` goes up.
    #[tracing::instrument(skip(self))]
    pub async fn decrement(&self, product_id: ProductId, count: i32) -> Result<Product, DomainError> {
        self.move_stock(StockMovement::Sale { product_id, count })
            .await
    }

    /// Restocks `count` units. `sold` is left unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn increment(&self, product_id: ProductId, count: i32) -> Result<Product, DomainError> {
        self.move_stock(StockMovement::Restock { product_id, count })
            .await
    }

    async fn move_stock(&self, movement: StockMovement) -> Result<Product, DomainError> {
        let product_id = movement.product_id();
        if movement.count() < 1 {
            return Err(DomainError::InvalidCommand(format!(
                "Stock count must be at least 1, got {}",
                movement.count()
            )));
        }

        let product = self
            .store
            .adjust_stock(vec![movement])
            .await?
            .into_iter()
            .find(|p| p.id == product_id)
            .ok_or_else(|| DomainError::not_found("Product", product_id))?;

        info!(
            %product_id,
            quantity = product.quantity,
            sold = product.sold,
            "Stock adjusted"
        );
        Ok(product)
    }
}
