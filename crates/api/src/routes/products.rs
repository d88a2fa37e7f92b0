//! Catalogue endpoints: public reads and admin writes.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use store::{NewProduct, Product, ProductPatch, ProductQuery, ShopStore};

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::state::AppState;

const MAX_PAGE_SIZE: usize = 100;

// -- Request types --

#[derive(Deserialize)]
pub struct ListProductsParams {
    pub q: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl From<ListProductsParams> for ProductQuery {
    fn from(params: ListProductsParams) -> Self {
        let mut query = ProductQuery::new()
            .limit(params.limit.unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE))
            .offset(params.offset.unwrap_or(0));
        if let Some(q) = params.q {
            query = query.search(q);
        }
        query
    }
}

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default)]
    pub quantity: i32,
}

impl TryFrom<CreateProductRequest> for NewProduct {
    type Error = ApiError;

    fn try_from(req: CreateProductRequest) -> Result<Self, Self::Error> {
        let title = req.title.trim().to_string();
        if title.is_empty() {
            return Err(ApiError::BadRequest("Title cannot be empty".to_string()));
        }
        validate_price(req.price)?;
        validate_quantity(req.quantity)?;
        Ok(NewProduct {
            title,
            description: req.description,
            price: req.price,
            quantity: req.quantity,
        })
    }
}

#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub quantity: Option<i32>,
}

impl TryFrom<UpdateProductRequest> for ProductPatch {
    type Error = ApiError;

    fn try_from(req: UpdateProductRequest) -> Result<Self, Self::Error> {
        let title = req.title.map(|t| t.trim().to_string());
        if title.as_deref() == Some("") {
            return Err(ApiError::BadRequest("Title cannot be empty".to_string()));
        }
        if let Some(price) = req.price {
            validate_price(price)?;
        }
        if let Some(quantity) = req.quantity {
            validate_quantity(quantity)?;
        }

        let patch = ProductPatch {
            title,
            description: req.description,
            price: req.price,
            quantity: req.quantity,
        };
        if patch.is_empty() {
            return Err(ApiError::BadRequest("Nothing to update".to_string()));
        }
        Ok(patch)
    }
}

#[derive(Deserialize)]
pub struct RestockRequest {
    pub count: i32,
}

// -- Response types --

#[derive(Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

fn validate_price(price: Money) -> Result<(), ApiError> {
    if price.is_negative() {
        return Err(ApiError::BadRequest("Price cannot be negative".to_string()));
    }
    if !price.is_whole_cents() {
        return Err(ApiError::BadRequest(
            "Price cannot have more than two decimal places".to_string(),
        ));
    }
    Ok(())
}

fn validate_quantity(quantity: i32) -> Result<(), ApiError> {
    if quantity < 0 {
        return Err(ApiError::BadRequest(
            "Quantity cannot be negative".to_string(),
        ));
    }
    Ok(())
}

// -- Handlers --

/// GET /products: list products, optionally filtered by title.
#[tracing::instrument(skip(state, params))]
pub async fn list<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ListProductsParams>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state.store.list_products(params.into()).await?;
    Ok(Json(products))
}

/// GET /products/{id}: load a product.
#[tracing::instrument(skip(state))]
pub async fn get<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, ApiError> {
    let product = state
        .store
        .get_product(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))?;
    Ok(Json(product))
}

/// POST /admin/products: add a product to the catalogue.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(_admin): AdminUser,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.store.create_product(req.try_into()?).await?;
    tracing::info!(product_id = %product.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// PATCH /admin/products/{id}: partial update. A new quantity overwrites
/// the stored one.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<ProductId>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    let product = state
        .store
        .update_product(id, req.try_into()?)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))?;
    Ok(Json(product))
}

/// DELETE /admin/products/{id}: remove a product. Past orders keep their
/// line snapshots.
#[tracing::instrument(skip(state))]
pub async fn delete<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<ProductId>,
) -> Result<Json<DeletedResponse>, ApiError> {
    if !state.store.delete_product(id).await? {
        return Err(ApiError::NotFound(format!("Product {id} not found")));
    }
    tracing::info!(product_id = %id, "product deleted");
    Ok(Json(DeletedResponse { deleted: true }))
}

/// POST /admin/products/{id}/restock: add stock through the inventory
/// ledger.
#[tracing::instrument(skip(state, req))]
pub async fn restock<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<ProductId>,
    Json(req): Json<RestockRequest>,
) -> Result<Json<Product>, ApiError> {
    let product = state.inventory.increment(id, req.count).await?;
    Ok(Json(product))
}
