//! Integration tests for the API server.

use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use api::{AppState, Config};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::StatusPolicy;
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use store::{InMemoryShopStore, ShopStore};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup_with_config(config: Config) -> (axum::Router, Arc<AppState<InMemoryShopStore>>) {
    let state = api::create_default_state(InMemoryShopStore::new(), &config);
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

fn setup() -> (axum::Router, Arc<AppState<InMemoryShopStore>>) {
    setup_with_config(Config::default())
}

/// Caller identity sent with a request.
#[derive(Clone, Copy)]
enum Caller {
    Anonymous,
    User(i64),
    Admin(i64),
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    caller: Caller,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    match caller {
        Caller::Anonymous => {}
        Caller::User(id) => builder = builder.header("x-user-id", id.to_string()),
        Caller::Admin(id) => {
            builder = builder
                .header("x-user-id", id.to_string())
                .header("x-user-role", "admin");
        }
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}

/// Registers a shopper and an admin, and creates one product as admin.
/// Returns (shopper id, admin id, product id).
async fn seed(app: &axum::Router, price: i64, quantity: i32) -> (i64, i64, i64) {
    let (status, shopper) = send(
        app,
        "POST",
        "/users",
        Caller::Anonymous,
        Some(json!({ "email": "shopper@example.com", "name": "Shopper" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, admin) = send(
        app,
        "POST",
        "/users",
        Caller::Anonymous,
        Some(json!({ "email": "admin@example.com", "role": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let admin_id = admin["id"].as_i64().unwrap();

    let (status, product) = send(
        app,
        "POST",
        "/admin/products",
        Caller::Admin(admin_id),
        Some(json!({ "title": "Teapot", "price": price, "quantity": quantity })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    (
        shopper["id"].as_i64().unwrap(),
        admin_id,
        product["id"].as_i64().unwrap(),
    )
}

async fn put_cart(app: &axum::Router, user: i64, product: i64, count: i32, price: i64) -> (StatusCode, Value) {
    send(
        app,
        "PUT",
        "/cart",
        Caller::User(user),
        Some(json!({ "items": [{ "product_id": product, "count": count, "price": price }] })),
    )
    .await
}

mod system {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let (app, _) = setup();
        let (status, json) = send(&app, "GET", "/health", Caller::Anonymous, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (app, _) = setup();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
    }
}

mod auth {
    use super::*;

    #[tokio::test]
    async fn test_cart_requires_identity() {
        let (app, _) = setup();
        let (status, json) = send(&app, "GET", "/cart", Caller::Anonymous, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(json["error"].as_str().unwrap().contains("x-user-id"));
    }

    #[tokio::test]
    async fn test_admin_routes_reject_users() {
        let (app, _) = setup();
        let (shopper, _, _) = seed(&app, 10, 1).await;

        let (status, _) = send(&app, "GET", "/admin/orders", Caller::User(shopper), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            "POST",
            "/admin/products",
            Caller::User(shopper),
            Some(json!({ "title": "Sneaky", "price": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let (app, _) = setup();
        seed(&app, 10, 1).await;
        let (status, _) = send(
            &app,
            "POST",
            "/users",
            Caller::Anonymous,
            Some(json!({ "email": "SHOPPER@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}

mod catalogue {
    use super::*;

    #[tokio::test]
    async fn test_product_crud() {
        let (app, _) = setup();
        let (_, admin, product) = seed(&app, 25, 4).await;

        let (status, json) = send(&app, "GET", &format!("/products/{product}"), Caller::Anonymous, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["title"], "Teapot");
        assert_eq!(decimal(&json["price"]), Decimal::from(25));

        let (status, json) = send(
            &app,
            "PATCH",
            &format!("/admin/products/{product}"),
            Caller::Admin(admin),
            Some(json!({ "quantity": 9 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["quantity"], 9);
        assert_eq!(json["title"], "Teapot");

        let (status, json) = send(&app, "GET", "/products?q=tea", Caller::Anonymous, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 1);

        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/admin/products/{product}"),
            Caller::Admin(admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, "GET", &format!("/products/{product}"), Caller::Anonymous, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_restock_through_ledger() {
        let (app, _) = setup();
        let (_, admin, product) = seed(&app, 25, 0).await;

        let (status, json) = send(
            &app,
            "POST",
            &format!("/admin/products/{product}/restock"),
            Caller::Admin(admin),
            Some(json!({ "count": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["quantity"], 5);
        assert_eq!(json["sold"], 0);

        let (status, _) = send(
            &app,
            "POST",
            &format!("/admin/products/{product}/restock"),
            Caller::Admin(admin),
            Some(json!({ "count": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

mod cart {
    use super::*;

    #[tokio::test]
    async fn test_replace_get_and_clear() {
        let (app, _) = setup();
        let (shopper, _, product) = seed(&app, 100, 10).await;

        let (status, json) = put_cart(&app, shopper, product, 2, 100).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&json["cart_total"]), Decimal::from(200));

        let (status, json) = put_cart(&app, shopper, product, 2, 100).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["items"].as_array().unwrap().len(), 1);
        assert_eq!(decimal(&json["cart_total"]), Decimal::from(200));

        let (status, json) = send(&app, "GET", "/cart", Caller::User(shopper), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["items"][0]["count"], 2);

        let (status, json) = send(&app, "DELETE", "/cart", Caller::User(shopper), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["deleted"], true);

        let (status, json) = send(&app, "DELETE", "/cart", Caller::User(shopper), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["deleted"], false);

        let (status, _) = send(&app, "GET", "/cart", Caller::User(shopper), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stock_gate_conflicts() {
        let (app, state) = setup();
        let (shopper, _, product) = seed(&app, 10, 3).await;

        let (status, json) = put_cart(&app, shopper, product, 4, 10).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(json["error"].as_str().unwrap().contains("requested 4"));
        assert_eq!(state.store.cart_count().await, 0);
    }

    #[tokio::test]
    async fn test_empty_payload_leaves_no_cart() {
        let (app, state) = setup();
        let (shopper, _, _) = seed(&app, 10, 3).await;

        let (status, _) = send(
            &app,
            "PUT",
            "/cart",
            Caller::User(shopper),
            Some(json!({ "items": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "GET", "/cart", Caller::User(shopper), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(state.store.cart_count().await, 0);
    }

    #[tokio::test]
    async fn test_sub_cent_price_is_bad_request() {
        let (app, _) = setup();
        let (shopper, _, product) = seed(&app, 10, 3).await;

        let (status, _) = send(
            &app,
            "PUT",
            "/cart",
            Caller::User(shopper),
            Some(json!({ "items": [{ "product_id": product, "count": 2, "price": "10.005" }] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_money_is_rendered_with_two_places() {
        let (app, _) = setup();
        let (shopper, _, product) = seed(&app, 100, 10).await;

        let (_, json) = put_cart(&app, shopper, product, 2, 100).await;
        assert_eq!(json["cart_total"], "200.00");
        assert_eq!(json["items"][0]["price"], "100.00");
    }

    #[tokio::test]
    async fn test_invalid_line_is_bad_request() {
        let (app, _) = setup();
        let (shopper, _, product) = seed(&app, 10, 3).await;

        let (status, _) = put_cart(&app, shopper, product, 0, 10).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

mod checkout {
    use super::*;

    #[tokio::test]
    async fn test_end_to_end_checkout() {
        let (app, state) = setup();
        let (shopper, admin, product) = seed(&app, 100, 10).await;
        put_cart(&app, shopper, product, 2, 100).await;

        let (status, intent) = send(
            &app,
            "POST",
            "/checkout/payment-intent",
            Caller::User(shopper),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(intent["amount"], 20000);
        assert_eq!(intent["currency"], "thb");

        let (status, order) = send(
            &app,
            "POST",
            "/checkout",
            Caller::User(shopper),
            Some(json!({
                "id": intent["id"],
                "amount": 20000,
                "status": "succeeded",
                "currency": "thb"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(decimal(&order["cart_total"]), Decimal::from(200));
        assert_eq!(decimal(&order["amount"]), Decimal::from(200));
        assert_eq!(order["order_status"], "NotProcessed");
        assert_eq!(order["payment_status"], "succeeded");
        assert_eq!(order["items"][0]["count"], 2);

        let product = state
            .store
            .get_product(store::ProductId::new(product))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.quantity, 8);
        assert_eq!(product.sold, 2);

        let (status, _) = send(&app, "GET", "/cart", Caller::User(shopper), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, mine) = send(&app, "GET", "/orders", Caller::User(shopper), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mine.as_array().unwrap().len(), 1);
        assert_eq!(mine[0]["lines"][0]["product"]["title"], "Teapot");

        let (status, all) = send(&app, "GET", "/admin/orders", Caller::Admin(admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all[0]["owner"]["email"], "shopper@example.com");
    }

    #[tokio::test]
    async fn test_checkout_without_cart_is_bad_request() {
        let (app, state) = setup();
        let (shopper, _, _) = seed(&app, 100, 10).await;

        let (status, json) = send(
            &app,
            "POST",
            "/checkout",
            Caller::User(shopper),
            Some(json!({ "id": "pi_1", "amount": 100, "status": "succeeded", "currency": "thb" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Cart is empty");
        assert_eq!(state.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_malformed_confirmation_is_bad_request() {
        let (app, _) = setup();
        let (shopper, _, product) = seed(&app, 100, 10).await;
        put_cart(&app, shopper, product, 1, 100).await;

        let (status, _) = send(
            &app,
            "POST",
            "/checkout",
            Caller::User(shopper),
            Some(json!({ "id": "", "amount": 100, "status": "succeeded", "currency": "thb" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_checkout_after_stock_drop_conflicts() {
        let (app, state) = setup();
        let (shopper, admin, product) = seed(&app, 100, 5).await;
        put_cart(&app, shopper, product, 3, 100).await;
        send(
            &app,
            "PATCH",
            &format!("/admin/products/{product}"),
            Caller::Admin(admin),
            Some(json!({ "quantity": 1 })),
        )
        .await;

        let (status, _) = send(
            &app,
            "POST",
            "/checkout",
            Caller::User(shopper),
            Some(json!({ "id": "pi_1", "amount": 30000, "status": "succeeded", "currency": "thb" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(state.store.order_count().await, 0);
        assert_eq!(state.store.cart_count().await, 1);
    }
}

mod order_status {
    use super::*;

    async fn place_order(app: &axum::Router) -> (i64, i64) {
        let (shopper, admin, product) = seed(app, 100, 10).await;
        put_cart(app, shopper, product, 1, 100).await;
        let (status, order) = send(
            app,
            "POST",
            "/checkout",
            Caller::User(shopper),
            Some(json!({ "id": "pi_1", "amount": 10000, "status": "succeeded", "currency": "thb" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        (admin, order["id"].as_i64().unwrap())
    }

    async fn set_status(app: &axum::Router, admin: i64, order: i64, status: &str) -> (StatusCode, Value) {
        send(
            app,
            "PUT",
            &format!("/admin/orders/{order}/status"),
            Caller::Admin(admin),
            Some(json!({ "status": status })),
        )
        .await
    }

    #[tokio::test]
    async fn test_unrestricted_policy_overwrites() {
        let (app, _) = setup();
        let (admin, order) = place_order(&app).await;

        let (status, json) = set_status(&app, admin, order, "Completed").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["order_status"], "Completed");

        let (status, json) = set_status(&app, admin, order, "Not Process").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["order_status"], "NotProcessed");
    }

    #[tokio::test]
    async fn test_any_label_is_stored_verbatim() {
        let (app, _) = setup();
        let (admin, order) = place_order(&app).await;

        let (status, _) = set_status(&app, admin, order, "Completed").await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = set_status(&app, admin, order, "anything").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["order_status"], "anything");

        let (_, all) = send(&app, "GET", "/admin/orders", Caller::Admin(admin), None).await;
        assert_eq!(all[0]["order"]["order_status"], "anything");
    }

    #[tokio::test]
    async fn test_blank_status_is_bad_request() {
        let (app, _) = setup();
        let (admin, order) = place_order(&app).await;

        let (status, _) = set_status(&app, admin, order, "  ").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_enforced_policy_conflicts() {
        let (app, _) = setup_with_config(Config {
            order_status_policy: StatusPolicy::Enforced,
            ..Config::default()
        });
        let (admin, order) = place_order(&app).await;

        let (status, _) = set_status(&app, admin, order, "Completed").await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = set_status(&app, admin, order, "anything").await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = set_status(&app, admin, order, "Processing").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_order_is_not_found() {
        let (app, _) = setup();
        let (_, admin, _) = seed(&app, 1, 1).await;

        let (status, _) = set_status(&app, admin, 999, "Completed").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
