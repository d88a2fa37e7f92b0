use async_trait::async_trait;
use common::{OrderId, OrderStatus, ProductId, UserId};

use crate::{
    Cart, CheckoutCommit, NewCart, NewOrder, NewProduct, NewUser, Order, OrderDetail, OrderQuery,
    Product, ProductPatch, ProductQuery, Result, StockMovement, User,
};

/// Core trait for store implementations.
///
/// Each method is one round trip and is atomic on its own: either all of its
/// writes land or none do. All implementations must be thread-safe
/// (Send + Sync).
#[async_trait]
pub trait ShopStore: Send + Sync {
    /// Registers a user.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Loads a user. Returns None if it doesn't exist.
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>>;

    /// Inserts a product.
    async fn create_product(&self, product: NewProduct) -> Result<Product>;

    /// Loads a product. Returns None if it doesn't exist.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Loads several products at once, in ID order. Missing IDs are skipped.
    async fn get_products(&self, product_ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Lists products in ID order.
    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>>;

    /// Applies a partial update. Returns None if the product doesn't exist.
    async fn update_product(
        &self,
        product_id: ProductId,
        patch: ProductPatch,
    ) -> Result<Option<Product>>;

    /// Deletes a product and any cart lines referencing it. Affected carts
    /// get their total recomputed, and carts left without lines are removed.
    /// Order lines keep their snapshot. Returns false if the product didn't
    /// exist.
    async fn delete_product(&self, product_id: ProductId) -> Result<bool>;

    /// Applies stock movements atomically.
    ///
    /// Sales are conditional: if any would drive a quantity negative the
    /// whole batch fails with `StockInsufficient` and nothing changes.
    /// Returns the affected products after the update, in ID order.
    async fn adjust_stock(&self, movements: Vec<StockMovement>) -> Result<Vec<Product>>;

    /// Deletes the owner's cart, if any, and inserts `cart` in its place.
    async fn replace_cart(&self, cart: NewCart) -> Result<Cart>;

    /// Loads the owner's cart with its lines in insertion order.
    async fn get_cart(&self, owner_id: UserId) -> Result<Option<Cart>>;

    /// Deletes the owner's cart and its lines. Returns false if there was none.
    async fn delete_cart(&self, owner_id: UserId) -> Result<bool>;

    /// Commits a checkout: removes the cart named by `commit.cart_id`, books
    /// every sale against stock and inserts the order, all or nothing.
    async fn commit_checkout(&self, commit: CheckoutCommit) -> Result<Order>;

    /// Loads an order. Returns None if it doesn't exist.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Lists orders in ID order with their lines and nested product data.
    async fn list_orders(&self, query: OrderQuery) -> Result<Vec<OrderDetail>>;

    /// Overwrites an order's lifecycle status. Returns None if the order
    /// doesn't exist.
    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>>;
}

/// Extension trait providing convenience methods for stores.
#[async_trait]
pub trait ShopStoreExt: ShopStore {
    /// Returns the available quantity of a product, or None if it doesn't
    /// exist.
    async fn available_quantity(&self, product_id: ProductId) -> Result<Option<i32>> {
        Ok(self.get_product(product_id).await?.map(|p| p.quantity))
    }

    /// Checks if the owner currently has a cart.
    async fn cart_exists(&self, owner_id: UserId) -> Result<bool> {
        Ok(self.get_cart(owner_id).await?.is_some())
    }
}

// Blanket implementation for all ShopStore implementations
impl<T: ShopStore + ?Sized> ShopStoreExt for T {}

/// Validates stock movements before applying them.
pub fn validate_movements(movements: &[StockMovement]) -> std::result::Result<(), String> {
    if movements.is_empty() {
        return Err("Cannot apply an empty list of stock movements".to_string());
    }

    if let Some(bad) = movements.iter().find(|m| m.count() < 1) {
        return Err(format!(
            "Stock movement for product {} must move at least one unit, got {}",
            bad.product_id(),
            bad.count()
        ));
    }

    Ok(())
}

/// Validates an order before it is written by a checkout.
pub fn validate_new_order(order: &NewOrder) -> std::result::Result<(), String> {
    if order.items.is_empty() {
        return Err("Cannot create an order without items".to_string());
    }
    if order.external_payment_id.trim().is_empty() {
        return Err("Order requires an external payment ID".to_string());
    }
    Ok(())
}
