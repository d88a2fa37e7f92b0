//! Payment confirmation received from the client after the provider
//! accepted a payment.

use common::Money;

use crate::error::CheckoutError;

/// A validated payment confirmation.
///
/// The confirmation is trusted as received; only its shape is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    id: String,
    amount_minor: i64,
    status: String,
    currency: String,
}

impl PaymentConfirmation {
    /// Validates and builds a confirmation.
    ///
    /// `amount_minor` is in the provider's minor units. `currency` must be a
    /// three-letter code and is stored lower-cased.
    pub fn new(
        id: impl Into<String>,
        amount_minor: i64,
        status: impl Into<String>,
        currency: impl AsRef<str>,
    ) -> Result<Self, CheckoutError> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(CheckoutError::InvalidConfirmation(
                "Payment ID cannot be empty".to_string(),
            ));
        }

        if amount_minor < 0 {
            return Err(CheckoutError::InvalidConfirmation(format!(
                "Amount cannot be negative, got {amount_minor}"
            )));
        }

        let currency = currency.as_ref().trim().to_ascii_lowercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CheckoutError::InvalidConfirmation(format!(
                "Currency must be a three-letter code, got '{currency}'"
            )));
        }

        Ok(Self {
            id,
            amount_minor,
            status: status.into(),
            currency,
        })
    }

    /// Returns the provider's payment ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the amount in minor units.
    pub fn amount_minor(&self) -> i64 {
        self.amount_minor
    }

    /// Returns the amount in major units.
    pub fn amount(&self) -> Money {
        Money::from_minor_units(self.amount_minor)
    }

    /// Returns the provider's payment status.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Returns the lower-cased currency code.
    pub fn currency(&self) -> &str {
        &self.currency
    }
}
