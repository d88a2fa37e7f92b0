//! Order listing and admin status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{OrderId, OrderStatus};
use serde::Deserialize;
use store::{Order, OrderDetail, ShopStore};

use crate::auth::{AdminUser, AuthUser};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

/// GET /orders: the caller's orders with line items and product data.
#[tracing::instrument(skip(state))]
pub async fn list_mine<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<Json<Vec<OrderDetail>>, ApiError> {
    let orders = state.orders.list_orders_for_user(user.user_id).await?;
    Ok(Json(orders))
}

/// GET /admin/orders: every order with owner contact fields.
#[tracing::instrument(skip(state))]
pub async fn list_all<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<OrderDetail>>, ApiError> {
    let orders = state.orders.list_all_orders().await?;
    Ok(Json(orders))
}

/// PUT /admin/orders/{id}/status: set an order's lifecycle status. Labels
/// outside the lifecycle table are stored as given unless the policy is
/// enforced.
#[tracing::instrument(skip(state, req))]
pub async fn set_status<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<OrderId>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let status: OrderStatus = req
        .status
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    let order = state.orders.set_order_status(id, status).await?;
    Ok(Json(order))
}
