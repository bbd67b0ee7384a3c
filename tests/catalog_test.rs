//! Catalog integration tests: slug handling, soft-delete listing and the
//! FK-protected delete path.

mod common;

use assert_matches::assert_matches;
use common::TestHarness;
use rust_decimal_macros::dec;
use storefront_api::{
    entities::user::ROLE_USER,
    errors::ServiceError,
    services::catalog::{CreateProductInput, ProductPatch},
    services::orders::{CreateOrderRequest, OrderLineInput},
};

fn product_input(name: &str) -> CreateProductInput {
    CreateProductInput {
        name: name.to_string(),
        slug: None,
        description: None,
        price: dec!(500.00),
        stock: 5,
        image_url: None,
        category: Some("rings".into()),
        is_featured: false,
        is_holiday_special: false,
    }
}

#[tokio::test]
async fn create_derives_slug_and_rejects_duplicates() {
    let h = TestHarness::new().await;

    let created = h
        .services
        .catalog
        .create_product(product_input("Gold Ring"))
        .await
        .unwrap();
    assert_eq!(created.slug, "gold-ring");

    let duplicate = h
        .services
        .catalog
        .create_product(product_input("Gold Ring"))
        .await;
    assert_matches!(duplicate, Err(ServiceError::Conflict(_)));
}

#[tokio::test]
async fn lookup_works_by_slug_and_by_id() {
    let h = TestHarness::new().await;
    let created = h
        .services
        .catalog
        .create_product(product_input("Gold Ring"))
        .await
        .unwrap();

    let by_slug = h.services.catalog.get_product("gold-ring").await.unwrap();
    assert_eq!(by_slug.id, created.id);

    let by_id = h
        .services
        .catalog
        .get_product(&created.id.to_string())
        .await
        .unwrap();
    assert_eq!(by_id.id, created.id);

    let missing = h.services.catalog.get_product("no-such-slug").await;
    assert_matches!(missing, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn soft_deleted_products_drop_out_of_listings() {
    let h = TestHarness::new().await;
    h.services
        .catalog
        .create_product(product_input("Gold Ring"))
        .await
        .unwrap();
    h.services
        .catalog
        .create_product(product_input("Silver Chain"))
        .await
        .unwrap();

    h.services
        .catalog
        .update_product(
            "silver-chain",
            ProductPatch {
                is_deleted: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let (products, total) = h.services.catalog.list_products(None, 1, 20).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(products[0].slug, "gold-ring");
}

#[tokio::test]
async fn category_filter_narrows_listing() {
    let h = TestHarness::new().await;
    h.services
        .catalog
        .create_product(product_input("Gold Ring"))
        .await
        .unwrap();
    let mut chain = product_input("Silver Chain");
    chain.category = Some("chains".into());
    h.services.catalog.create_product(chain).await.unwrap();

    let (products, total) = h
        .services
        .catalog
        .list_products(Some("chains"), 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(products[0].slug, "silver-chain");
}

#[tokio::test]
async fn deleting_ordered_product_is_blocked_with_guidance() {
    let h = TestHarness::new().await;
    let user = h.seed_user("buyer@example.com", ROLE_USER).await;
    let ring = h
        .services
        .catalog
        .create_product(product_input("Gold Ring"))
        .await
        .unwrap();

    h.services
        .orders
        .create_order(
            user.id,
            CreateOrderRequest {
                items: vec![OrderLineInput {
                    product_id: ring.id,
                    quantity: 1,
                }],
                shipping_address: None,
                customer_name: None,
                phone: None,
                payment_method: None,
            },
        )
        .await
        .unwrap();

    let result = h.services.catalog.delete_product("gold-ring").await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));

    // Still present; the caller is expected to soft-disable instead
    assert!(h.services.catalog.get_product("gold-ring").await.is_ok());
}

#[tokio::test]
async fn unordered_product_deletes_cleanly() {
    let h = TestHarness::new().await;
    h.services
        .catalog
        .create_product(product_input("Gold Ring"))
        .await
        .unwrap();

    h.services.catalog.delete_product("gold-ring").await.unwrap();
    let missing = h.services.catalog.get_product("gold-ring").await;
    assert_matches!(missing, Err(ServiceError::NotFound(_)));
}
