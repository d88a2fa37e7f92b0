//! Shared identifiers and value types for the storefront workspace.

mod money;
mod status;
mod types;

pub use money::Money;
pub use status::{OrderStatus, ParseOrderStatusError};
pub use types::{CartId, OrderId, ProductId, UserId};
