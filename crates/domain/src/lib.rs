//! Domain layer for the storefront.
//!
//! This crate provides the services that sit on top of the shop store:
//! - CartService for replacing, reading and clearing an owner's cart
//! - InventoryLedger for checking and moving product stock
//! - OrderRecords for order listings and lifecycle status changes
//! - Validated commands and the domain error type

pub mod cart;
pub mod commands;
pub mod error;
pub mod inventory;
pub mod orders;

pub use cart::{CartService, cart_total};
pub use commands::ReplaceCart;
pub use error::DomainError;
pub use inventory::InventoryLedger;
pub use orders::{OrderRecords, StatusPolicy};
