//! Cart aggregate service.

use common::{Money, UserId};
use store::{Cart, CartLineItem, NewCart, ShopStore};
use tracing::{info, warn};

use crate::commands::ReplaceCart;
use crate::error::DomainError;
use crate::inventory::InventoryLedger;

/// Returns `Σ count × price` over the lines.
pub fn cart_total(items: &[CartLineItem]) -> Money {
    items.iter().map(CartLineItem::line_total).sum()
}

/// Service for managing carts.
///
/// An owner has at most one cart. Every submission replaces it wholesale;
/// nothing is merged with the previous contents.
pub struct CartService<S: ShopStore> {
    store: S,
    ledger: InventoryLedger<S>,
}

impl<S: ShopStore + Clone> CartService<S> {
    /// Creates a new cart service with the given store.
    pub fn new(store: S) -> Self {
        Self {
            ledger: InventoryLedger::new(store.clone()),
            store,
        }
    }
}

impl<S: ShopStore> CartService<S> {
    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replaces the owner's cart.
    ///
    /// Stock is checked for every product before anything is written; one
    /// short product rejects the whole call and leaves the existing cart
    /// untouched.
    #[tracing::instrument(skip(self, cmd), fields(owner_id = %cmd.owner_id(), lines = cmd.items().len()))]
    pub async fn replace_cart(&self, cmd: ReplaceCart) -> Result<Cart, DomainError> {
        for (product_id, requested) in cmd.requested_counts()? {
            let available = self.ledger.available(product_id).await?;
            if available < requested {
                metrics::counter!("cart_stock_rejections_total").increment(1);
                warn!(%product_id, requested, available, "Cart rejected: insufficient stock");
                return Err(DomainError::StockInsufficient {
                    product_id,
                    requested,
                    available,
                });
            }
        }

        let owner_id = cmd.owner_id();
        let items = cmd.into_items();
        let cart = self
            .store
            .replace_cart(NewCart {
                owner_id,
                cart_total: cart_total(&items),
                items,
            })
            .await?;

        metrics::counter!("carts_replaced_total").increment(1);
        info!(cart_id = %cart.id, total = %cart.cart_total, "Cart replaced");
        Ok(cart)
    }

    /// Loads the owner's cart.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, owner_id: UserId) -> Result<Cart, DomainError> {
        self.store
            .get_cart(owner_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Cart", owner_id))
    }

    /// Deletes the owner's cart. Returns false if there was none.
    #[tracing::instrument(skip(self))]
    pub async fn clear_cart(&self, owner_id: UserId) -> Result<bool, DomainError> {
        Ok(self.store.delete_cart(owner_id).await?)
    }
}
