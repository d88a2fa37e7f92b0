//! External service traits and in-memory implementations used by checkout.

pub mod payment;

pub use payment::{InMemoryPaymentGateway, PaymentGateway, PaymentIntent};
