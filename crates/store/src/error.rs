use common::{ProductId, UserId};
use thiserror::Error;

/// Errors that can occur when interacting with the shop store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A stock movement would drive a product's quantity below zero.
    #[error(
        "Stock insufficient for product {product_id}: requested {requested}, available {available}"
    )]
    StockInsufficient {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },

    /// A referenced product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A referenced user does not exist.
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// A user with this email is already registered.
    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    /// The owner's cart was replaced, cleared or checked out by a
    /// concurrent request.
    #[error("Cart for user {0} was modified concurrently")]
    CartChanged(UserId),

    /// A write was rejected before reaching storage.
    #[error("Invalid write: {0}")]
    InvalidWrite(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
