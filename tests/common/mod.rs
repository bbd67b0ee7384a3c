//! Shared harness for integration tests: in-memory SQLite with the real
//! migrations, service container wired with stub collaborators.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use migrations::{Migrator, MigratorTrait};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, PaginatorTrait,
    Set,
};
use uuid::Uuid;

use storefront_api::{
    auth::google::{IdentityVerifier, VerifiedIdentity},
    auth::{AuthConfig, AuthService, AuthUser},
    config::AppConfig,
    entities::{order::Entity as OrderEntity, product, user},
    errors::ServiceError,
    events::EventSender,
    handlers::AppServices,
    services::payment_gateway::{GatewayOrder, PaymentGateway},
    services::payments::sign_webhook_body,
};

pub const WEBHOOK_SECRET: &str = "whsec_integration_test";

/// Recorded gateway call: (amount_minor, currency, receipt)
pub type GatewayCall = (i64, String, String);

/// In-process gateway double. Succeeds with a deterministic order id unless
/// told to fail; records every call.
pub struct StubGateway {
    pub fail: bool,
    pub calls: Mutex<Vec<GatewayCall>>,
}

impl StubGateway {
    pub fn ok() -> Self {
        Self {
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, ServiceError> {
        self.calls
            .lock()
            .unwrap()
            .push((amount_minor, currency.to_string(), receipt.to_string()));

        if self.fail {
            return Err(ServiceError::PaymentGateway(
                "stub gateway configured to fail".into(),
            ));
        }

        Ok(GatewayOrder {
            id: format!("order_stub_{}", receipt),
        })
    }
}

/// Identity double asserting a fixed identity for any token
pub struct StubVerifier {
    pub email: String,
    pub name: Option<String>,
}

#[async_trait]
impl IdentityVerifier for StubVerifier {
    async fn verify(&self, _token: &str) -> Result<VerifiedIdentity, ServiceError> {
        Ok(VerifiedIdentity {
            email: self.email.clone(),
            name: self.name.clone(),
        })
    }
}

pub struct TestHarness {
    pub db: Arc<DatabaseConnection>,
    pub services: AppServices,
    pub auth: AuthService,
    pub gateway: Arc<StubGateway>,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_gateway(StubGateway::ok()).await
    }

    pub async fn with_gateway(gateway: StubGateway) -> Self {
        // One pooled connection keeps the in-memory database alive and shared
        let mut opt = ConnectOptions::new("sqlite::memory:".to_string());
        opt.max_connections(1).min_connections(1);
        let db = Database::connect(opt).await.expect("sqlite connect");
        Migrator::up(&db, None).await.expect("migrations");
        let db = Arc::new(db);

        let mut cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "test_secret_key_for_testing_purposes_only_32chars".into(),
            3600,
            "127.0.0.1".into(),
            18_080,
            "test".into(),
        );
        cfg.gateway_webhook_secret = WEBHOOK_SECRET.into();
        cfg.gateway_key_id = "rzp_test_key".into();
        cfg.currency = "INR".into();

        let (event_tx, event_rx) = tokio::sync::mpsc::channel(64);
        tokio::spawn(storefront_api::events::process_events(event_rx));

        let gateway = Arc::new(gateway);
        let verifier = Arc::new(StubVerifier {
            email: "social@example.com".into(),
            name: Some("Social User".into()),
        });

        let services = AppServices::with_collaborators(
            db.clone(),
            EventSender::new(event_tx),
            gateway.clone(),
            verifier,
            &cfg,
        );

        let auth = AuthService::new(AuthConfig::new(
            cfg.jwt_secret.clone(),
            cfg.auth_issuer.clone(),
            cfg.auth_audience.clone(),
            Duration::from_secs(3600),
        ));

        Self {
            db,
            services,
            auth,
            gateway,
        }
    }

    pub async fn seed_user(&self, email: &str, role: &str) -> user::Model {
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            password_hash: Set(None),
            full_name: Set(None),
            phone: Set(None),
            role: Set(role.to_string()),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("seed user")
    }

    pub async fn seed_product(&self, name: &str, slug: &str, price: Decimal) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            description: Set(None),
            price: Set(price),
            stock: Set(10),
            image_url: Set(None),
            category: Set(None),
            is_featured: Set(false),
            is_holiday_special: Set(false),
            is_deleted: Set(false),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await
        .expect("seed product")
    }

    pub fn auth_user_for(&self, user: &user::Model) -> AuthUser {
        AuthUser {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role.clone(),
        }
    }

    pub async fn order_count(&self) -> u64 {
        OrderEntity::find().count(&*self.db).await.expect("count")
    }
}

/// Builds a signed `payment.captured` webhook body
pub fn captured_event(payment_id: &str, gateway_order_id: &str) -> (Vec<u8>, String) {
    let body = serde_json::json!({
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "order_id": gateway_order_id,
                    "status": "captured"
                }
            }
        }
    })
    .to_string()
    .into_bytes();

    let signature = sign_webhook_body(&body, WEBHOOK_SECRET);
    (body, signature)
}
