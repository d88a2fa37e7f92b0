//! HTTP API server for the storefront.
//!
//! Provides REST endpoints for the catalogue, carts, checkout and orders,
//! with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use store::ShopStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{Config, LogFormat};
pub use state::{AppState, create_default_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: ShopStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/users", post(routes::users::create::<S>))
        .route("/products", get(routes::products::list::<S>))
        .route("/products/{id}", get(routes::products::get::<S>))
        .route("/admin/products", post(routes::products::create::<S>))
        .route(
            "/admin/products/{id}",
            patch(routes::products::update::<S>).delete(routes::products::delete::<S>),
        )
        .route(
            "/admin/products/{id}/restock",
            post(routes::products::restock::<S>),
        )
        .route(
            "/cart",
            put(routes::cart::replace::<S>)
                .get(routes::cart::get::<S>)
                .delete(routes::cart::clear::<S>),
        )
        .route(
            "/checkout/payment-intent",
            post(routes::checkout::payment_intent::<S>),
        )
        .route("/checkout", post(routes::checkout::finalize::<S>))
        .route("/orders", get(routes::orders::list_mine::<S>))
        .route("/admin/orders", get(routes::orders::list_all::<S>))
        .route(
            "/admin/orders/{id}/status",
            put(routes::orders::set_status::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
