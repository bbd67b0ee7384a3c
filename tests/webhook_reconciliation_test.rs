//! Webhook Reconciler integration tests: signature gating, idempotent
//! capture, and the accept-but-ignore handling of unmatched data.

mod common;

use assert_matches::assert_matches;
use common::{captured_event, TestHarness, WEBHOOK_SECRET};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use storefront_api::{
    entities::order::Entity as OrderEntity,
    entities::user::ROLE_USER,
    errors::ServiceError,
    services::orders::{CreateOrderRequest, OrderLineInput},
    services::payments::{sign_webhook_body, WebhookOutcome},
};
use uuid::Uuid;

/// Seeds a user + product, initiates payment, returns (order_id, gateway_order_id)
async fn initiated_order(h: &TestHarness) -> (Uuid, String) {
    let user = h.seed_user("payer@example.com", ROLE_USER).await;
    let ring = h.seed_product("Gold Ring", "gold-ring", dec!(500.00)).await;

    let response = h
        .services
        .payments
        .create_payment_order(
            user.id,
            CreateOrderRequest {
                items: vec![OrderLineInput {
                    product_id: ring.id,
                    quantity: 2,
                }],
                shipping_address: None,
                customer_name: None,
                phone: None,
                payment_method: None,
            },
        )
        .await
        .unwrap();

    (response.order_id, response.gateway_order_id)
}

#[tokio::test]
async fn captured_event_marks_order_paid() {
    let h = TestHarness::new().await;
    let (order_id, gateway_order_id) = initiated_order(&h).await;

    let (body, signature) = captured_event("pay_A1", &gateway_order_id);
    let outcome = h
        .services
        .payments
        .handle_webhook(&body, Some(signature.as_str()))
        .await
        .unwrap();

    assert_eq!(outcome, WebhookOutcome::Captured { order_id });

    let order = OrderEntity::find_by_id(order_id)
        .one(&*h.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, "paid");
    assert_eq!(order.payment_status, "captured");
    assert_eq!(order.gateway_payment_id.as_deref(), Some("pay_A1"));
}

#[tokio::test]
async fn identical_delivery_twice_is_idempotent() {
    let h = TestHarness::new().await;
    let (order_id, gateway_order_id) = initiated_order(&h).await;

    let (body, signature) = captured_event("pay_A1", &gateway_order_id);

    let first = h
        .services
        .payments
        .handle_webhook(&body, Some(signature.as_str()))
        .await
        .unwrap();
    assert_eq!(first, WebhookOutcome::Captured { order_id });

    // Gateways retry; the same event arrives again
    let second = h
        .services
        .payments
        .handle_webhook(&body, Some(signature.as_str()))
        .await
        .unwrap();
    assert_eq!(second, WebhookOutcome::AlreadyProcessed { order_id });

    let order = OrderEntity::find_by_id(order_id)
        .one(&*h.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, "paid");
    assert_eq!(order.payment_status, "captured");
    assert_eq!(order.gateway_payment_id.as_deref(), Some("pay_A1"));
}

#[tokio::test]
async fn missing_signature_rejects_before_any_mutation() {
    let h = TestHarness::new().await;
    let (order_id, gateway_order_id) = initiated_order(&h).await;

    let (body, _) = captured_event("pay_A1", &gateway_order_id);
    let result = h.services.payments.handle_webhook(&body, None).await;
    assert_matches!(result, Err(ServiceError::MissingSignature));

    let order = OrderEntity::find_by_id(order_id)
        .one(&*h.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, "pending");
    assert_eq!(order.gateway_payment_id, None);
}

#[tokio::test]
async fn tampered_body_rejects_before_any_mutation() {
    let h = TestHarness::new().await;
    let (order_id, gateway_order_id) = initiated_order(&h).await;

    let (body, signature) = captured_event("pay_A1", &gateway_order_id);

    // Signature computed over a different body
    let mut tampered = body.clone();
    tampered.extend_from_slice(b" ");
    let result = h
        .services
        .payments
        .handle_webhook(&tampered, Some(signature.as_str()))
        .await;
    assert_matches!(result, Err(ServiceError::InvalidSignature));

    let order = OrderEntity::find_by_id(order_id)
        .one(&*h.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, "pending");
    assert_eq!(order.payment_status, "pending");
}

#[tokio::test]
async fn orphan_payment_event_is_acknowledged_and_ignored() {
    let h = TestHarness::new().await;
    let (order_id, _) = initiated_order(&h).await;

    // Valid signature, but the gateway order id matches nothing locally
    let (body, signature) = captured_event("pay_B2", "order_stub_unknown");
    let outcome = h
        .services
        .payments
        .handle_webhook(&body, Some(signature.as_str()))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::NoMatchingOrder);

    let order = OrderEntity::find_by_id(order_id)
        .one(&*h.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, "pending");
}

#[tokio::test]
async fn unrecognized_event_types_are_acknowledged_untouched() {
    let h = TestHarness::new().await;
    let (order_id, gateway_order_id) = initiated_order(&h).await;

    let body = serde_json::json!({
        "event": "payment.failed",
        "payload": {
            "payment": {
                "entity": { "id": "pay_C3", "order_id": gateway_order_id }
            }
        }
    })
    .to_string()
    .into_bytes();
    let signature = sign_webhook_body(&body, WEBHOOK_SECRET);

    let outcome = h
        .services
        .payments
        .handle_webhook(&body, Some(signature.as_str()))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);

    let order = OrderEntity::find_by_id(order_id)
        .one(&*h.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, "pending");
    assert_eq!(order.payment_status, "pending");
}
