//! Cart endpoints for the authenticated caller.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::{Money, ProductId};
use domain::ReplaceCart;
use serde::{Deserialize, Serialize};
use store::{Cart, CartLineItem, ShopStore};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct ReplaceCartRequest {
    pub items: Vec<CartItemRequest>,
}

#[derive(Deserialize)]
pub struct CartItemRequest {
    pub product_id: ProductId,
    pub count: i32,
    pub price: Money,
}

impl From<CartItemRequest> for CartLineItem {
    fn from(item: CartItemRequest) -> Self {
        CartLineItem {
            product_id: item.product_id,
            count: item.count,
            price: item.price,
        }
    }
}

// -- Response types --

#[derive(Serialize)]
pub struct ClearCartResponse {
    pub deleted: bool,
}

// -- Handlers --

/// PUT /cart: replace the caller's cart with the submitted lines.
#[tracing::instrument(skip(state, req))]
pub async fn replace<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Json(req): Json<ReplaceCartRequest>,
) -> Result<Json<Cart>, ApiError> {
    let items = req.items.into_iter().map(CartLineItem::from).collect();
    let cmd = ReplaceCart::new(user.user_id, items)?;
    let cart = state.carts.replace_cart(cmd).await?;
    Ok(Json(cart))
}

/// GET /cart: the caller's cart with lines and total.
#[tracing::instrument(skip(state))]
pub async fn get<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<Json<Cart>, ApiError> {
    let cart = state.carts.get_cart(user.user_id).await?;
    Ok(Json(cart))
}

/// DELETE /cart: clear the caller's cart. Succeeds when there is none.
#[tracing::instrument(skip(state))]
pub async fn clear<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<Json<ClearCartResponse>, ApiError> {
    let deleted = state.carts.clear_cart(user.user_id).await?;
    Ok(Json(ClearCartResponse { deleted }))
}
