//! Payment Initiator integration tests: minor-unit conversion at the gateway
//! boundary, gateway id persistence, and the pending-orphan failure mode.

mod common;

use assert_matches::assert_matches;
use common::{StubGateway, TestHarness};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use storefront_api::{
    entities::order::Entity as OrderEntity,
    entities::user::ROLE_USER,
    errors::ServiceError,
    services::orders::{CreateOrderRequest, OrderLineInput},
};

fn payment_request(product_id: uuid::Uuid, quantity: i32) -> CreateOrderRequest {
    CreateOrderRequest {
        items: vec![OrderLineInput {
            product_id,
            quantity,
        }],
        shipping_address: Some(serde_json::json!({"city": "Pune"})),
        customer_name: None,
        phone: None,
        payment_method: None,
    }
}

#[tokio::test]
async fn initiation_creates_gateway_order_in_minor_units() {
    let h = TestHarness::new().await;
    let user = h.seed_user("payer@example.com", ROLE_USER).await;
    let ring = h.seed_product("Gold Ring", "gold-ring", dec!(500.00)).await;

    let response = h
        .services
        .payments
        .create_payment_order(user.id, payment_request(ring.id, 2))
        .await
        .unwrap();

    assert_eq!(response.amount, dec!(1000.00));
    assert_eq!(response.currency, "INR");
    assert_eq!(response.key_id, "rzp_test_key");

    // The gateway saw integer minor units keyed by the local order id
    let calls = h.gateway.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    let (amount_minor, currency, receipt) = &calls[0];
    assert_eq!(*amount_minor, 100_000);
    assert_eq!(currency, "INR");
    assert_eq!(receipt, &response.order_id.to_string());

    // The gateway order id was persisted onto the local order
    let order = OrderEntity::find_by_id(response.order_id)
        .one(&*h.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        order.gateway_order_id.as_deref(),
        Some(response.gateway_order_id.as_str())
    );
    assert_eq!(order.payment_method, "razorpay");
    assert_eq!(order.status, "pending");
    assert_eq!(order.payment_status, "pending");
}

#[tokio::test]
async fn gateway_failure_leaves_pending_order_without_gateway_id() {
    let h = TestHarness::with_gateway(StubGateway::failing()).await;
    let user = h.seed_user("payer@example.com", ROLE_USER).await;
    let ring = h.seed_product("Gold Ring", "gold-ring", dec!(500.00)).await;

    let result = h
        .services
        .payments
        .create_payment_order(user.id, payment_request(ring.id, 1))
        .await;
    assert_matches!(result, Err(ServiceError::PaymentGateway(_)));

    // The local order survives as a pending orphan; no automatic rollback
    assert_eq!(h.order_count().await, 1);
    let order = OrderEntity::find().one(&*h.db).await.unwrap().unwrap();
    assert_eq!(order.status, "pending");
    assert_eq!(order.gateway_order_id, None);
}
