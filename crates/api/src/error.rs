//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::DomainError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or malformed caller identity.
    Unauthorized(String),
    /// Caller lacks the required role.
    Forbidden(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Checkout error.
    Checkout(CheckoutError),
    /// Store error.
    Store(StoreError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
            ApiError::Internal(msg) => internal(msg),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn internal(cause: impl std::fmt::Display) -> (StatusCode, String) {
    tracing::error!(error = %cause, "internal server error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match err {
        DomainError::EmptyCart | DomainError::InvalidCommand(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::StockInsufficient { .. } | DomainError::InvalidStatusTransition { .. } => {
            (StatusCode::CONFLICT, err.to_string())
        }
        DomainError::Store(store_err) => store_error_to_response(store_err),
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match err {
        CheckoutError::EmptyCart | CheckoutError::InvalidConfirmation(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        CheckoutError::Domain(domain_err) => domain_error_to_response(domain_err),
        CheckoutError::Store(store_err) => store_error_to_response(store_err),
        CheckoutError::PaymentGateway(_) => internal(err),
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    match err {
        StoreError::ProductNotFound(_) | StoreError::UserNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        StoreError::StockInsufficient { .. }
        | StoreError::CartChanged(_)
        | StoreError::DuplicateEmail(_) => (StatusCode::CONFLICT, err.to_string()),
        StoreError::InvalidWrite(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        StoreError::Database(_) | StoreError::Migration(_) => internal(err),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{OrderStatus, ProductId, UserId};

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn domain_errors_map_to_client_statuses() {
        assert_eq!(status_of(DomainError::EmptyCart), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(DomainError::not_found("Order", 1)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DomainError::StockInsufficient {
                product_id: ProductId::new(1),
                requested: 2,
                available: 1,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DomainError::InvalidStatusTransition {
                from: OrderStatus::Completed,
                to: OrderStatus::Processing,
            }),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn checkout_errors_map_to_client_statuses() {
        assert_eq!(status_of(CheckoutError::EmptyCart), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(CheckoutError::Store(StoreError::CartChanged(UserId::new(1)))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(CheckoutError::PaymentGateway("down".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn auth_errors_map_to_401_and_403() {
        assert_eq!(
            status_of(ApiError::Unauthorized("no id".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ApiError::Forbidden("admin only".to_string())),
            StatusCode::FORBIDDEN
        );
    }
}
