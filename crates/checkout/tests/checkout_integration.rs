//! Integration tests for the checkout orchestrator.

use checkout::{
    CheckoutError, CheckoutOrchestrator, InMemoryPaymentGateway, PaymentConfirmation,
};
use common::{Money, OrderStatus, ProductId, UserId};
use domain::{CartService, DomainError, ReplaceCart};
use store::{
    CartLineItem, InMemoryShopStore, NewProduct, NewUser, OrderLineItem, OrderQuery, ProductPatch,
    Role, ShopStore, ShopStoreExt, StoreError,
};

type TestOrchestrator = CheckoutOrchestrator<InMemoryShopStore, InMemoryPaymentGateway>;

struct TestHarness {
    store: InMemoryShopStore,
    carts: CartService<InMemoryShopStore>,
    orchestrator: TestOrchestrator,
    gateway: InMemoryPaymentGateway,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryShopStore::new();
        let gateway = InMemoryPaymentGateway::new();
        Self {
            carts: CartService::new(store.clone()),
            orchestrator: CheckoutOrchestrator::new(store.clone(), gateway.clone()),
            store,
            gateway,
        }
    }

    async fn user(&self, email: &str) -> UserId {
        self.store
            .create_user(NewUser {
                email: email.to_string(),
                name: None,
                role: Role::User,
            })
            .await
            .unwrap()
            .id
    }

    async fn product(&self, price: i64, quantity: i32) -> ProductId {
        self.store
            .create_product(NewProduct {
                title: "Desk lamp".to_string(),
                description: String::new(),
                price: Money::from_major(price),
                quantity,
            })
            .await
            .unwrap()
            .id
    }

    async fn cart(&self, owner: UserId, product_id: ProductId, count: i32, price: i64) {
        self.carts
            .replace_cart(
                ReplaceCart::new(
                    owner,
                    vec![CartLineItem {
                        product_id,
                        count,
                        price: Money::from_major(price),
                    }],
                )
                .unwrap(),
            )
            .await
            .unwrap();
    }
}

fn confirmation(id: &str, amount_minor: i64) -> PaymentConfirmation {
    PaymentConfirmation::new(id, amount_minor, "succeeded", "thb").unwrap()
}

mod finalize {
    use super::*;

    #[tokio::test]
    async fn happy_path_snapshots_cart_and_moves_stock() {
        let h = TestHarness::new();
        let owner = h.user("u@example.com").await;
        let product = h.product(100, 10).await;
        h.cart(owner, product, 2, 100).await;
        assert_eq!(
            h.carts.get_cart(owner).await.unwrap().cart_total,
            Money::from_major(200)
        );

        let order = h
            .orchestrator
            .finalize_order(owner, confirmation("pi_1", 20000))
            .await
            .unwrap();

        assert_eq!(order.cart_total, Money::from_major(200));
        assert_eq!(order.amount, Money::from_major(200));
        assert_eq!(
            order.items,
            vec![OrderLineItem {
                product_id: product,
                count: 2,
                price: Money::from_major(100),
            }]
        );
        assert_eq!(order.external_payment_id, "pi_1");
        assert_eq!(order.payment_status, "succeeded");
        assert_eq!(order.currency, "thb");
        assert_eq!(order.order_status, OrderStatus::NotProcessed);

        let product = h.store.get_product(product).await.unwrap().unwrap();
        assert_eq!(product.quantity, 8);
        assert_eq!(product.sold, 2);
        assert!(!h.store.cart_exists(owner).await.unwrap());
    }

    #[tokio::test]
    async fn missing_cart_is_empty_cart() {
        let h = TestHarness::new();
        let owner = h.user("u@example.com").await;

        let err = h
            .orchestrator
            .finalize_order(owner, confirmation("pi_1", 100))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
        assert_eq!(h.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn cart_emptied_by_product_deletion_is_empty_cart() {
        let h = TestHarness::new();
        let owner = h.user("u@example.com").await;
        let product = h.product(100, 5).await;
        h.cart(owner, product, 1, 100).await;
        h.store.delete_product(product).await.unwrap();

        let err = h
            .orchestrator
            .finalize_order(owner, confirmation("pi_1", 10000))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
        assert_eq!(h.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn deleted_product_drops_out_of_the_charged_total() {
        let h = TestHarness::new();
        let owner = h.user("u@example.com").await;
        let lamp = h.product(100, 5).await;
        let bulb = h.product(20, 5).await;
        h.carts
            .replace_cart(
                ReplaceCart::new(
                    owner,
                    vec![
                        CartLineItem {
                            product_id: lamp,
                            count: 1,
                            price: Money::from_major(100),
                        },
                        CartLineItem {
                            product_id: bulb,
                            count: 2,
                            price: Money::from_major(20),
                        },
                    ],
                )
                .unwrap(),
            )
            .await
            .unwrap();
        h.store.delete_product(lamp).await.unwrap();

        let intent = h.orchestrator.create_payment_intent(owner).await.unwrap();
        assert_eq!(intent.amount, 4000);

        let order = h
            .orchestrator
            .finalize_order(owner, confirmation(&intent.id, intent.amount))
            .await
            .unwrap();
        assert_eq!(order.cart_total, Money::from_major(40));
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].product_id, bulb);
    }

    #[tokio::test]
    async fn stock_lowered_after_carting_fails_cleanly() {
        let h = TestHarness::new();
        let owner = h.user("u@example.com").await;
        let product = h.product(100, 5).await;
        h.cart(owner, product, 3, 100).await;

        h.store
            .update_product(
                product,
                ProductPatch {
                    quantity: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = h
            .orchestrator
            .finalize_order(owner, confirmation("pi_1", 30000))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Domain(DomainError::StockInsufficient {
                requested: 3,
                available: 2,
                ..
            })
        ));

        assert_eq!(h.store.order_count().await, 0);
        let product = h.store.get_product(product).await.unwrap().unwrap();
        assert_eq!(product.quantity, 2);
        assert_eq!(product.sold, 0);
        assert!(h.store.cart_exists(owner).await.unwrap());
    }

    #[tokio::test]
    async fn one_short_line_blocks_every_line() {
        let h = TestHarness::new();
        let owner = h.user("u@example.com").await;
        let plenty = h.product(10, 10).await;
        let scarce = h.product(20, 1).await;
        h.carts
            .replace_cart(
                ReplaceCart::new(
                    owner,
                    vec![
                        CartLineItem {
                            product_id: plenty,
                            count: 2,
                            price: Money::from_major(10),
                        },
                        CartLineItem {
                            product_id: scarce,
                            count: 1,
                            price: Money::from_major(20),
                        },
                    ],
                )
                .unwrap(),
            )
            .await
            .unwrap();
        h.store
            .update_product(
                scarce,
                ProductPatch {
                    quantity: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(
            h.orchestrator
                .finalize_order(owner, confirmation("pi_1", 4000))
                .await
                .is_err()
        );
        assert_eq!(h.store.available_quantity(plenty).await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn concurrent_checkouts_of_one_cart_create_one_order() {
        let h = TestHarness::new();
        let owner = h.user("u@example.com").await;
        let product = h.product(100, 10).await;
        h.cart(owner, product, 1, 100).await;

        let (a, b) = tokio::join!(
            h.orchestrator
                .finalize_order(owner, confirmation("pi_a", 10000)),
            h.orchestrator
                .finalize_order(owner, confirmation("pi_b", 10000)),
        );

        assert_eq!(u8::from(a.is_ok()) + u8::from(b.is_ok()), 1);
        let loser = if a.is_err() { a } else { b };
        assert!(matches!(
            loser.unwrap_err(),
            CheckoutError::EmptyCart | CheckoutError::Store(StoreError::CartChanged(_))
        ));
        assert_eq!(h.store.order_count().await, 1);
        assert_eq!(h.store.available_quantity(product).await.unwrap(), Some(9));
    }

    #[tokio::test]
    async fn orders_are_listed_for_their_owner() {
        let h = TestHarness::new();
        let owner = h.user("u@example.com").await;
        let product = h.product(100, 10).await;

        for id in ["pi_1", "pi_2"] {
            h.cart(owner, product, 1, 100).await;
            h.orchestrator
                .finalize_order(owner, confirmation(id, 10000))
                .await
                .unwrap();
        }

        let orders = h
            .store
            .list_orders(OrderQuery::for_owner(owner))
            .await
            .unwrap();
        let ids: Vec<_> = orders
            .iter()
            .map(|o| o.order.external_payment_id.as_str())
            .collect();
        assert_eq!(ids, vec!["pi_1", "pi_2"]);
    }
}

mod payment_intent {
    use super::*;

    #[tokio::test]
    async fn intent_amount_is_cart_total_in_minor_units() {
        let h = TestHarness::new();
        let owner = h.user("u@example.com").await;
        let product = h.product(100, 10).await;
        h.cart(owner, product, 2, 100).await;

        let intent = h.orchestrator.create_payment_intent(owner).await.unwrap();
        assert_eq!(intent.amount, 20000);
        assert_eq!(intent.currency, "thb");
        assert_eq!(h.gateway.intent_count(), 1);

        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["amount"], 20000);
        assert!(json["client_secret"].is_string());
    }

    #[tokio::test]
    async fn configured_currency_is_used() {
        let store = InMemoryShopStore::new();
        let h = TestHarness::new();
        let orchestrator =
            CheckoutOrchestrator::new(store.clone(), h.gateway.clone()).with_currency("USD");
        assert_eq!(orchestrator.currency(), "usd");

        let owner = store
            .create_user(NewUser {
                email: "u@example.com".to_string(),
                name: None,
                role: Role::User,
            })
            .await
            .unwrap()
            .id;
        let product = store
            .create_product(NewProduct {
                title: "Mug".to_string(),
                description: String::new(),
                price: Money::from_minor_units(1999),
                quantity: 1,
            })
            .await
            .unwrap();
        CartService::new(store.clone())
            .replace_cart(
                ReplaceCart::new(
                    owner,
                    vec![CartLineItem {
                        product_id: product.id,
                        count: 1,
                        price: product.price,
                    }],
                )
                .unwrap(),
            )
            .await
            .unwrap();

        let intent = orchestrator.create_payment_intent(owner).await.unwrap();
        assert_eq!(intent.amount, 1999);
        assert_eq!(intent.currency, "usd");
    }

    #[tokio::test]
    async fn intent_without_cart_is_empty_cart() {
        let h = TestHarness::new();
        let owner = h.user("u@example.com").await;

        let err = h.orchestrator.create_payment_intent(owner).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
        assert_eq!(h.gateway.intent_count(), 0);
    }

    #[tokio::test]
    async fn gateway_failure_is_reported() {
        let h = TestHarness::new();
        let owner = h.user("u@example.com").await;
        let product = h.product(100, 10).await;
        h.cart(owner, product, 1, 100).await;
        h.gateway.set_fail_on_create(true);

        let err = h.orchestrator.create_payment_intent(owner).await.unwrap_err();
        assert!(matches!(err, CheckoutError::PaymentGateway(_)));
        assert!(h.store.cart_exists(owner).await.unwrap());
    }
}
