//! Order lifecycle status.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Administrative lifecycle status of an order.
///
/// The four lifecycle statuses follow this table:
/// ```text
/// NotProcessed ──► Processing ──► Completed
///      │               │
///      └───────────────┴──► Cancelled
/// ```
/// Any other label an administrator sets is kept verbatim as `Other`; it has
/// no transitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OrderStatus {
    /// Paid but not yet picked up by staff.
    #[default]
    NotProcessed,

    /// Being prepared for dispatch.
    Processing,

    /// Delivered to the buyer (terminal state).
    Completed,

    /// Cancelled by staff (terminal state).
    Cancelled,

    /// A label outside the lifecycle table, stored as given.
    Other(String),
}

/// Error returned for a blank status label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid order status: {0:?}")]
pub struct ParseOrderStatusError(pub String);

impl OrderStatus {
    /// The lifecycle statuses, in order.
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::NotProcessed,
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    /// Returns true if the transition table allows moving to `next`.
    pub fn can_transition_to(&self, next: &OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (NotProcessed, Processing)
                | (NotProcessed, Cancelled)
                | (Processing, Completed)
                | (Processing, Cancelled)
        )
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Returns true for the four lifecycle statuses.
    pub fn is_known(&self) -> bool {
        !matches!(self, OrderStatus::Other(_))
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::NotProcessed => "NotProcessed",
            OrderStatus::Processing => "Processing",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Other(label) => label,
        }
    }

    /// Bounded metric label: the status name, or `other`.
    pub fn metric_label(&self) -> &'static str {
        match self {
            OrderStatus::NotProcessed => "NotProcessed",
            OrderStatus::Processing => "Processing",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Other(_) => "other",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseOrderStatusError;

    /// Recognises lifecycle labels case-insensitively, ignoring spaces and
    /// underscores (the storefront front end sends `"Not Process"`). Any
    /// other non-blank label becomes `Other` with surrounding whitespace
    /// trimmed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseOrderStatusError(s.to_string()));
        }

        let normalized: String = trimmed
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        Ok(match normalized.as_str() {
            "notprocess" | "notprocessed" => OrderStatus::NotProcessed,
            "processing" => OrderStatus::Processing,
            "completed" => OrderStatus::Completed,
            "cancelled" | "canceled" => OrderStatus::Cancelled,
            _ => OrderStatus::Other(trimmed.to_string()),
        })
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = ParseOrderStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}
