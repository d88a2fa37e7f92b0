//! Domain error types.

use common::{OrderStatus, ProductId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Checkout was attempted with no cart or a cart without lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// A requested count exceeds the product's available quantity.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    StockInsufficient {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },

    /// The referenced entity doesn't exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A command failed validation.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// The status policy rejected a lifecycle change.
    #[error("Cannot move order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl DomainError {
    /// Creates a `NotFound` error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::StockInsufficient {
                product_id,
                requested,
                available,
            } => Self::StockInsufficient {
                product_id,
                requested,
                available,
            },
            StoreError::ProductNotFound(id) => Self::not_found("Product", id),
            StoreError::UserNotFound(id) => Self::not_found("User", id),
            StoreError::InvalidWrite(msg) => Self::InvalidCommand(msg),
            other => Self::Store(other),
        }
    }
}
