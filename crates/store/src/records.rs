//! Rows persisted by the store and the write models used to create them.

use chrono::{DateTime, Utc};
use common::{CartId, Money, OrderId, OrderStatus, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// Role attached to a user by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Returns the role name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields required to register a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
}

/// Contact fields of an order's owner, projected into administrative listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerContact {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
}

impl From<&User> for OwnerContact {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

/// A catalogue product together with its inventory counters.
///
/// `quantity` is the available stock and never goes negative. `sold` is the
/// cumulative number of units checked out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub price: Money,
    pub quantity: i32,
    pub sold: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub price: Money,
    pub quantity: i32,
}

/// Partial update of a product. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub quantity: Option<i32>,
}

impl ProductPatch {
    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.quantity.is_none()
    }

    pub(crate) fn apply_to(self, product: &mut Product) {
        if let Some(title) = self.title {
            product.title = title;
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(quantity) = self.quantity {
            product.quantity = quantity;
        }
    }
}

/// One product line in a cart. `price` is the unit price captured when the
/// line was added, not the live catalogue price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub product_id: ProductId,
    pub count: i32,
    pub price: Money,
}

impl CartLineItem {
    /// Returns `count × price`.
    pub fn line_total(&self) -> Money {
        self.price.multiply(i64::from(self.count))
    }
}

/// A user's cart. There is at most one per owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub owner_id: UserId,
    pub items: Vec<CartLineItem>,
    pub cart_total: Money,
    pub created_at: DateTime<Utc>,
}

impl Cart {
    /// Returns true if the cart holds no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A cart to be written, replacing whatever the owner had before.
#[derive(Debug, Clone)]
pub struct NewCart {
    pub owner_id: UserId,
    pub items: Vec<CartLineItem>,
    pub cart_total: Money,
}

/// One product line in an order, copied verbatim from the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub product_id: ProductId,
    pub count: i32,
    pub price: Money,
}

impl From<&CartLineItem> for OrderLineItem {
    fn from(line: &CartLineItem) -> Self {
        Self {
            product_id: line.product_id,
            count: line.count,
            price: line.price,
        }
    }
}

/// An order snapshot. Only `order_status` changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner_id: UserId,
    pub items: Vec<OrderLineItem>,
    pub cart_total: Money,
    pub external_payment_id: String,
    pub amount: Money,
    pub payment_status: String,
    pub currency: String,
    pub order_status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// An order to be written by a checkout.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub owner_id: UserId,
    pub items: Vec<OrderLineItem>,
    pub cart_total: Money,
    pub external_payment_id: String,
    pub amount: Money,
    pub payment_status: String,
    pub currency: String,
}

/// An order line joined with the current catalogue row, if it still exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineDetail {
    pub item: OrderLineItem,
    pub product: Option<Product>,
}

/// An order with nested product data and, for administrative listings, the
/// owner's contact fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: Order,
    pub lines: Vec<OrderLineDetail>,
    pub owner: Option<OwnerContact>,
}

/// A single change to a product's inventory counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockMovement {
    /// Units leave stock: `quantity -= count`, `sold += count`. Rejected if
    /// `quantity` would go negative.
    Sale { product_id: ProductId, count: i32 },

    /// Units return to stock: `quantity += count`.
    Restock { product_id: ProductId, count: i32 },
}

impl StockMovement {
    /// Returns the product the movement applies to.
    pub fn product_id(&self) -> ProductId {
        match self {
            StockMovement::Sale { product_id, .. } | StockMovement::Restock { product_id, .. } => {
                *product_id
            }
        }
    }

    /// Returns the number of units moved.
    pub fn count(&self) -> i32 {
        match self {
            StockMovement::Sale { count, .. } | StockMovement::Restock { count, .. } => *count,
        }
    }
}

/// Everything a checkout writes, applied as one atomic unit: the cart is
/// removed, every sale is booked against stock and the order is inserted.
#[derive(Debug, Clone)]
pub struct CheckoutCommit {
    /// The cart being checked out. The commit fails with `CartChanged` if the
    /// owner's current cart has a different ID.
    pub cart_id: CartId,
    pub order: NewOrder,
    pub movements: Vec<StockMovement>,
}
