pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod records;
pub mod store;

pub use common::{CartId, Money, OrderId, OrderStatus, ProductId, UserId};
pub use error::{Result, StoreError};
pub use memory::InMemoryShopStore;
pub use postgres::PostgresShopStore;
pub use query::{OrderQuery, ProductQuery};
pub use records::{
    Cart, CartLineItem, CheckoutCommit, NewCart, NewOrder, NewProduct, NewUser, Order,
    OrderDetail, OrderLineDetail, OrderLineItem, OwnerContact, Product, ProductPatch, Role,
    StockMovement, User,
};
pub use store::{ShopStore, ShopStoreExt};
