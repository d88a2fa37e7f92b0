//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::UserId;
use serde::Serialize;
use uuid::Uuid;

use crate::error::CheckoutError;

/// A provider-side payment intent the client completes to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentIntent {
    /// The intent ID assigned by the provider.
    pub id: String,

    /// Secret handed to the client to complete the payment.
    pub client_secret: String,

    /// Amount in minor units.
    pub amount: i64,

    /// Lower-cased currency code.
    pub currency: String,
}

/// Trait for payment provider operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment intent for `amount_minor` minor units.
    async fn create_intent(
        &self,
        owner_id: UserId,
        amount_minor: i64,
        currency: &str,
    ) -> Result<PaymentIntent, CheckoutError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    intents: HashMap<String, (UserId, PaymentIntent)>,
    next_id: u32,
    fail_on_create: bool,
}

/// In-memory payment gateway for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to refuse intent creation.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_create = fail;
    }

    /// Returns the number of intents created.
    pub fn intent_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .intents
            .len()
    }

    /// Returns an intent and the owner it was created for.
    pub fn get_intent(&self, intent_id: &str) -> Option<(UserId, PaymentIntent)> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .intents
            .get(intent_id)
            .cloned()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_intent(
        &self,
        owner_id: UserId,
        amount_minor: i64,
        currency: &str,
    ) -> Result<PaymentIntent, CheckoutError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_create {
            return Err(CheckoutError::PaymentGateway(
                "Payment intent declined".to_string(),
            ));
        }

        state.next_id += 1;
        let id = format!("pi_{:04}", state.next_id);
        let intent = PaymentIntent {
            client_secret: format!("{id}_secret_{}", Uuid::new_v4().simple()),
            id: id.clone(),
            amount: amount_minor,
            currency: currency.to_ascii_lowercase(),
        };
        state.intents.insert(id, (owner_id, intent.clone()));

        Ok(intent)
    }
}
