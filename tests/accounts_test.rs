//! Account integration tests: signup/login, social sign-in without a
//! password credential, and owner-scoped address management.

mod common;

use assert_matches::assert_matches;
use common::TestHarness;
use storefront_api::{
    entities::user::ROLE_USER,
    errors::ServiceError,
    services::customers::{AddressPatch, CreateAddressInput, SignupRequest},
};
use uuid::Uuid;

fn signup(email: &str) -> SignupRequest {
    SignupRequest {
        email: email.to_string(),
        password: "correct-horse-battery".into(),
        full_name: Some("Asha".into()),
    }
}

fn address() -> CreateAddressInput {
    CreateAddressInput {
        street: "12 MG Road".into(),
        city: "Pune".into(),
        state: "MH".into(),
        zip: "411001".into(),
        country: "IN".into(),
        is_default: true,
    }
}

#[tokio::test]
async fn signup_then_login_round_trip() {
    let h = TestHarness::new().await;

    let user = h
        .services
        .customers
        .signup(signup("asha@example.com"))
        .await
        .unwrap();
    assert_eq!(user.role, ROLE_USER);
    assert!(user.password_hash.is_some());

    let authenticated = h
        .services
        .customers
        .authenticate("asha@example.com", "correct-horse-battery")
        .await
        .unwrap();
    assert_eq!(authenticated.id, user.id);

    // Tokens issued for the account validate back to the same identity
    let token = h.auth.generate_token(&authenticated).unwrap();
    let claims = h.auth.validate_token(&token.access_token).unwrap();
    assert_eq!(claims.sub, user.id.to_string());

    let wrong = h
        .services
        .customers
        .authenticate("asha@example.com", "not-the-password")
        .await;
    assert_matches!(wrong, Err(ServiceError::Unauthorized(_)));
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let h = TestHarness::new().await;
    h.services
        .customers
        .signup(signup("asha@example.com"))
        .await
        .unwrap();

    let second = h
        .services
        .customers
        .signup(signup("asha@example.com"))
        .await;
    assert_matches!(second, Err(ServiceError::Conflict(_)));
}

#[tokio::test]
async fn weak_password_is_rejected() {
    let h = TestHarness::new().await;
    let mut request = signup("asha@example.com");
    request.password = "short".into();

    let result = h.services.customers.signup(request).await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn social_signin_creates_passwordless_account_once() {
    let h = TestHarness::new().await;

    // Harness verifier asserts social@example.com for any token
    let first = h
        .services
        .customers
        .social_signin("opaque-provider-token")
        .await
        .unwrap();
    assert_eq!(first.email, "social@example.com");
    assert_eq!(first.password_hash, None);

    let second = h
        .services
        .customers
        .social_signin("another-token")
        .await
        .unwrap();
    assert_eq!(second.id, first.id);

    // No password credential, so password login is refused
    let login = h
        .services
        .customers
        .authenticate("social@example.com", "anything")
        .await;
    assert_matches!(login, Err(ServiceError::Unauthorized(_)));
}

#[tokio::test]
async fn addresses_are_scoped_to_their_owner() {
    let h = TestHarness::new().await;
    let asha = h.seed_user("asha@example.com", ROLE_USER).await;
    let ravi = h.seed_user("ravi@example.com", ROLE_USER).await;

    let created = h
        .services
        .customers
        .create_address(asha.id, address())
        .await
        .unwrap();

    // Owner sees it
    let listed = h.services.customers.list_addresses(asha.id).await.unwrap();
    assert_eq!(listed.len(), 1);

    // Another user can neither update nor delete it
    let update = h
        .services
        .customers
        .update_address(
            ravi.id,
            created.id,
            AddressPatch {
                city: Some("Mumbai".into()),
                ..Default::default()
            },
        )
        .await;
    assert_matches!(update, Err(ServiceError::NotFound(_)));

    let delete = h.services.customers.delete_address(ravi.id, created.id).await;
    assert_matches!(delete, Err(ServiceError::NotFound(_)));

    // The owner can
    let updated = h
        .services
        .customers
        .update_address(
            asha.id,
            created.id,
            AddressPatch {
                city: Some("Mumbai".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.city, "Mumbai");

    h.services
        .customers
        .delete_address(asha.id, created.id)
        .await
        .unwrap();
    let empty = h.services.customers.list_addresses(asha.id).await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn missing_address_is_not_found() {
    let h = TestHarness::new().await;
    let asha = h.seed_user("asha@example.com", ROLE_USER).await;

    let result = h
        .services
        .customers
        .delete_address(asha.id, Uuid::new_v4())
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}
