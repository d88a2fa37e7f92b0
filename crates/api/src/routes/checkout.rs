//! Checkout endpoints: payment intent and order finalization.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use checkout::{PaymentConfirmation, PaymentIntent};
use serde::Deserialize;
use store::{Order, ShopStore};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Payment confirmation as sent by the client after the provider accepted
/// the payment. `amount` is in minor units.
#[derive(Deserialize)]
pub struct FinalizeOrderRequest {
    pub id: String,
    pub amount: i64,
    pub status: String,
    pub currency: String,
}

impl TryFrom<FinalizeOrderRequest> for PaymentConfirmation {
    type Error = ApiError;

    fn try_from(req: FinalizeOrderRequest) -> Result<Self, Self::Error> {
        PaymentConfirmation::new(req.id, req.amount, req.status, req.currency)
            .map_err(ApiError::from)
    }
}

/// POST /checkout/payment-intent: request a payment intent for the
/// caller's cart total.
#[tracing::instrument(skip(state))]
pub async fn payment_intent<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<Json<PaymentIntent>, ApiError> {
    let intent = state.checkout.create_payment_intent(user.user_id).await?;
    Ok(Json(intent))
}

/// POST /checkout: turn the caller's cart into an order.
#[tracing::instrument(skip(state, req))]
pub async fn finalize<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Json(req): Json<FinalizeOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let confirmation = PaymentConfirmation::try_from(req)?;
    let order = state
        .checkout
        .finalize_order(user.user_id, confirmation)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}
