//! Validated commands.
//!
//! Request payloads are parsed into these types at the edge; a value that
//! exists has already passed validation.

use std::collections::BTreeMap;

use common::{ProductId, UserId};
use store::CartLineItem;

use crate::error::DomainError;

/// Command to replace an owner's cart wholesale.
#[derive(Debug, Clone)]
pub struct ReplaceCart {
    owner_id: UserId,
    items: Vec<CartLineItem>,
}

impl ReplaceCart {
    /// Creates a ReplaceCart command.
    ///
    /// A cart needs at least one line. Every line needs a count of at least
    /// one and a non-negative unit price in whole cents.
    pub fn new(owner_id: UserId, items: Vec<CartLineItem>) -> Result<Self, DomainError> {
        if items.is_empty() {
            return Err(DomainError::InvalidCommand(
                "Cart must contain at least one item".to_string(),
            ));
        }
        for (index, line) in items.iter().enumerate() {
            if line.count < 1 {
                return Err(DomainError::InvalidCommand(format!(
                    "Line {index} for product {} must have a count of at least 1, got {}",
                    line.product_id, line.count
                )));
            }
            if line.price.is_negative() {
                return Err(DomainError::InvalidCommand(format!(
                    "Line {index} for product {} has a negative price",
                    line.product_id
                )));
            }
            if !line.price.is_whole_cents() {
                return Err(DomainError::InvalidCommand(format!(
                    "Line {index} for product {} has a price with more than two decimal places",
                    line.product_id
                )));
            }
        }
        Ok(Self { owner_id, items })
    }

    /// Returns the cart owner.
    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    /// Returns the lines in submission order.
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    /// Consumes the command, returning its lines.
    pub fn into_items(self) -> Vec<CartLineItem> {
        self.items
    }

    /// Sums requested counts per product, so a product split over several
    /// lines is checked against stock once.
    pub fn requested_counts(&self) -> Result<BTreeMap<ProductId, i32>, DomainError> {
        let mut counts: BTreeMap<ProductId, i32> = BTreeMap::new();
        for line in &self.items {
            let total = counts.entry(line.product_id).or_insert(0);
            *total = total.checked_add(line.count).ok_or_else(|| {
                DomainError::InvalidCommand(format!(
                    "Requested count for product {} is too large",
                    line.product_id
                ))
            })?;
        }
        Ok(counts)
    }
}
