use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    Cart, CartId, CartLineItem, CheckoutCommit, NewCart, NewProduct, NewUser, Order, OrderDetail,
    OrderId, OrderLineDetail, OrderQuery, OrderStatus, OwnerContact, Product, ProductId,
    ProductPatch, ProductQuery, Result, StockMovement, StoreError, User, UserId,
    store::{ShopStore, validate_movements, validate_new_order},
};

#[derive(Debug, Default)]
struct Sequences {
    user: i64,
    product: i64,
    cart: i64,
    order: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    products: BTreeMap<ProductId, Product>,
    carts: BTreeMap<UserId, Cart>,
    orders: BTreeMap<OrderId, Order>,
    sequences: Sequences,
}

impl Tables {
    /// Checks every movement against projected stock, then applies them.
    /// Nothing is mutated if any check fails.
    fn apply_movements(&mut self, movements: &[StockMovement]) -> Result<Vec<ProductId>> {
        let mut projected: HashMap<ProductId, i32> = HashMap::new();
        for movement in movements {
            let product_id = movement.product_id();
            let product = self
                .products
                .get(&product_id)
                .ok_or(StoreError::ProductNotFound(product_id))?;
            let available = projected.entry(product_id).or_insert(product.quantity);

            match *movement {
                StockMovement::Sale { count, .. } => {
                    if *available < count {
                        return Err(StoreError::StockInsufficient {
                            product_id,
                            requested: count,
                            available: *available,
                        });
                    }
                    *available -= count;
                }
                StockMovement::Restock { count, .. } => {
                    *available = available.checked_add(count).ok_or_else(|| {
                        StoreError::InvalidWrite(format!(
                            "Restocking product {product_id} by {count} overflows its quantity"
                        ))
                    })?;
                }
            }
        }

        let now = Utc::now();
        let mut touched = Vec::with_capacity(projected.len());
        for movement in movements {
            if let Some(product) = self.products.get_mut(&movement.product_id()) {
                match *movement {
                    StockMovement::Sale { count, .. } => {
                        product.quantity -= count;
                        product.sold = product.sold.saturating_add(count);
                    }
                    StockMovement::Restock { count, .. } => {
                        product.quantity += count;
                    }
                }
                product.updated_at = now;
                touched.push(product.id);
            }
        }
        touched.sort();
        touched.dedup();
        Ok(touched)
    }

    fn detail(&self, order: &Order, include_owner: bool) -> OrderDetail {
        let lines = order
            .items
            .iter()
            .map(|item| OrderLineDetail {
                item: item.clone(),
                product: self.products.get(&item.product_id).cloned(),
            })
            .collect();
        let owner = if include_owner {
            self.users.get(&order.owner_id).map(OwnerContact::from)
        } else {
            None
        };

        OrderDetail {
            order: order.clone(),
            lines,
            owner,
        }
    }
}

/// In-memory store implementation for testing and database-less runs.
///
/// All tables sit behind one lock, so every trait method is atomic, which
/// matches the transactional guarantees of the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryShopStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryShopStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns the total number of carts stored.
    pub async fn cart_count(&self) -> usize {
        self.tables.read().await.carts.len()
    }

    /// Clears all tables and resets ID sequences.
    pub async fn clear(&self) {
        *self.tables.write().await = Tables::default();
    }
}

#[async_trait]
impl ShopStore for InMemoryShopStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;

        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail(user.email));
        }

        let id = UserId::new(next(&mut tables.sequences.user));
        let user = User {
            id,
            email: user.email,
            name: user.name,
            role: user.role,
            enabled: true,
            created_at: Utc::now(),
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        if product.quantity < 0 {
            return Err(StoreError::InvalidWrite(
                "Product quantity cannot be negative".to_string(),
            ));
        }

        let mut tables = self.tables.write().await;
        let id = ProductId::new(next(&mut tables.sequences.product));
        let now = Utc::now();
        let product = Product {
            id,
            title: product.title,
            description: product.description,
            price: product.price,
            quantity: product.quantity,
            sold: 0,
            created_at: now,
            updated_at: now,
        };
        tables.products.insert(id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(&product_id).cloned())
    }

    async fn get_products(&self, product_ids: &[ProductId]) -> Result<Vec<Product>> {
        let tables = self.tables.read().await;
        let mut products: Vec<Product> = product_ids
            .iter()
            .filter_map(|id| tables.products.get(id).cloned())
            .collect();
        products.sort_by_key(|p| p.id);
        products.dedup_by_key(|p| p.id);
        Ok(products)
    }

    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>> {
        let tables = self.tables.read().await;
        let products = tables
            .products
            .values()
            .filter(|p| query.matches_title(&p.title))
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(products)
    }

    async fn update_product(
        &self,
        product_id: ProductId,
        patch: ProductPatch,
    ) -> Result<Option<Product>> {
        if patch.quantity.is_some_and(|q| q < 0) {
            return Err(StoreError::InvalidWrite(
                "Product quantity cannot be negative".to_string(),
            ));
        }

        let mut tables = self.tables.write().await;
        let Some(product) = tables.products.get_mut(&product_id) else {
            return Ok(None);
        };
        patch.apply_to(product);
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn delete_product(&self, product_id: ProductId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.products.remove(&product_id).is_none() {
            return Ok(false);
        }

        // Mirrors ON DELETE CASCADE on cart lines, then refreshes the totals
        // of the carts that lost lines. Carts left without lines go away.
        tables.carts.retain(|_, cart| {
            let before = cart.items.len();
            cart.items.retain(|line| line.product_id != product_id);
            if cart.items.len() != before {
                cart.cart_total = cart.items.iter().map(CartLineItem::line_total).sum();
            }
            !cart.items.is_empty()
        });
        Ok(true)
    }

    async fn adjust_stock(&self, movements: Vec<StockMovement>) -> Result<Vec<Product>> {
        validate_movements(&movements).map_err(StoreError::InvalidWrite)?;

        let mut tables = self.tables.write().await;
        let touched = tables.apply_movements(&movements)?;
        Ok(touched
            .iter()
            .filter_map(|id| tables.products.get(id).cloned())
            .collect())
    }

    async fn replace_cart(&self, cart: NewCart) -> Result<Cart> {
        let mut tables = self.tables.write().await;

        if !tables.users.contains_key(&cart.owner_id) {
            return Err(StoreError::UserNotFound(cart.owner_id));
        }
        if let Some(missing) = cart
            .items
            .iter()
            .find(|line| !tables.products.contains_key(&line.product_id))
        {
            return Err(StoreError::ProductNotFound(missing.product_id));
        }

        let id = CartId::new(next(&mut tables.sequences.cart));
        let cart = Cart {
            id,
            owner_id: cart.owner_id,
            items: cart.items,
            cart_total: cart.cart_total,
            created_at: Utc::now(),
        };
        tables.carts.insert(cart.owner_id, cart.clone());
        Ok(cart)
    }

    async fn get_cart(&self, owner_id: UserId) -> Result<Option<Cart>> {
        Ok(self.tables.read().await.carts.get(&owner_id).cloned())
    }

    async fn delete_cart(&self, owner_id: UserId) -> Result<bool> {
        Ok(self.tables.write().await.carts.remove(&owner_id).is_some())
    }

    async fn commit_checkout(&self, commit: CheckoutCommit) -> Result<Order> {
        validate_new_order(&commit.order).map_err(StoreError::InvalidWrite)?;
        validate_movements(&commit.movements).map_err(StoreError::InvalidWrite)?;

        let owner_id = commit.order.owner_id;
        let mut tables = self.tables.write().await;

        match tables.carts.get(&owner_id) {
            Some(cart) if cart.id == commit.cart_id => {}
            _ => return Err(StoreError::CartChanged(owner_id)),
        }

        tables.apply_movements(&commit.movements)?;
        tables.carts.remove(&owner_id);

        let id = OrderId::new(next(&mut tables.sequences.order));
        let order = Order {
            id,
            owner_id,
            items: commit.order.items,
            cart_total: commit.order.cart_total,
            external_payment_id: commit.order.external_payment_id,
            amount: commit.order.amount,
            payment_status: commit.order.payment_status,
            currency: commit.order.currency,
            order_status: OrderStatus::default(),
            created_at: Utc::now(),
        };
        tables.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&order_id).cloned())
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<Vec<OrderDetail>> {
        let tables = self.tables.read().await;
        let details = tables
            .orders
            .values()
            .filter(|o| query.owner_id.is_none_or(|owner| o.owner_id == owner))
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|o| tables.detail(o, query.include_owner))
            .collect();
        Ok(details)
    }

    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>> {
        let mut tables = self.tables.write().await;
        Ok(tables.orders.get_mut(&order_id).map(|order| {
            order.order_status = status;
            order.clone()
        }))
    }
}
