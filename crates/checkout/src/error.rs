//! Checkout error types.

use domain::DomainError;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The owner has no cart, or the cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// The payment confirmation failed validation.
    #[error("Invalid payment confirmation: {0}")]
    InvalidConfirmation(String),

    /// The payment gateway refused or failed a request.
    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for CheckoutError {
    /// Errors with a domain meaning are lifted; storage failures stay as is.
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::StockInsufficient { .. }
            | StoreError::ProductNotFound(_)
            | StoreError::UserNotFound(_)
            | StoreError::InvalidWrite(_) => CheckoutError::Domain(DomainError::from(e)),
            other => CheckoutError::Store(other),
        }
    }
}

impl CheckoutError {
    /// Short label for failure metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            CheckoutError::EmptyCart => "empty_cart",
            CheckoutError::InvalidConfirmation(_) => "invalid_confirmation",
            CheckoutError::PaymentGateway(_) => "payment_gateway",
            CheckoutError::Domain(DomainError::StockInsufficient { .. }) => "stock_insufficient",
            CheckoutError::Domain(_) => "domain",
            CheckoutError::Store(StoreError::CartChanged(_)) => "cart_changed",
            CheckoutError::Store(_) => "store",
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
