//! Checkout for the storefront.
//!
//! The orchestrator finalizes an order from a confirmed cart:
//! 1. Load the owner's cart
//! 2. Snapshot its lines and total into an order
//! 3. Book every line against stock
//! 4. Remove the cart
//!
//! Steps 2 to 4 are one atomic store commit. The crate also holds the
//! payment gateway seam used to create payment intents.

pub mod confirmation;
pub mod error;
pub mod orchestrator;
pub mod services;

pub use confirmation::PaymentConfirmation;
pub use error::CheckoutError;
pub use orchestrator::{CheckoutOrchestrator, DEFAULT_CURRENCY};
pub use services::{InMemoryPaymentGateway, PaymentGateway, PaymentIntent};
