pub mod auth;
pub mod orders;
pub mod payment_webhooks;
pub mod payments;
pub mod products;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use crate::auth::google::{GoogleTokenVerifier, IdentityVerifier};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::services::{
    catalog::ProductCatalogService,
    customers::CustomerService,
    order_status::OrderStatusService,
    orders::OrderService,
    payment_gateway::{PaymentGateway, RazorpayGateway},
    payments::PaymentService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<ProductCatalogService>,
    pub customers: Arc<CustomerService>,
    pub orders: Arc<OrderService>,
    pub order_status: Arc<OrderStatusService>,
    pub payments: Arc<PaymentService>,
}

impl AppServices {
    /// Build the service container with production collaborators derived
    /// from the configuration.
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, cfg: &AppConfig) -> Result<Self, ServiceError> {
        let gateway: Arc<dyn PaymentGateway> = Arc::new(RazorpayGateway::new(
            cfg.gateway_base_url.clone(),
            cfg.gateway_key_id.clone(),
            cfg.gateway_key_secret.clone(),
            Duration::from_secs(cfg.gateway_timeout_secs),
        )?);
        let identity_verifier: Arc<dyn IdentityVerifier> =
            Arc::new(GoogleTokenVerifier::new(cfg.google_client_id.clone())?);

        Ok(Self::with_collaborators(
            db,
            event_sender,
            gateway,
            identity_verifier,
            cfg,
        ))
    }

    /// Build the container with explicit collaborators; used by tests to
    /// substitute the gateway and identity verifier.
    pub fn with_collaborators(
        db: Arc<DbPool>,
        event_sender: EventSender,
        gateway: Arc<dyn PaymentGateway>,
        identity_verifier: Arc<dyn IdentityVerifier>,
        cfg: &AppConfig,
    ) -> Self {
        let event_sender = Arc::new(event_sender);

        let catalog = Arc::new(ProductCatalogService::new(
            db.clone(),
            Some(event_sender.clone()),
        ));
        let customers = Arc::new(CustomerService::new(
            db.clone(),
            identity_verifier,
            Some(event_sender.clone()),
        ));
        let orders = Arc::new(OrderService::new(db.clone(), Some(event_sender.clone())));
        let order_status = Arc::new(OrderStatusService::new(
            db.clone(),
            Some(event_sender.clone()),
        ));
        let payments = Arc::new(PaymentService::new(
            db,
            orders.clone(),
            gateway,
            cfg.currency.clone(),
            cfg.gateway_key_id.clone(),
            cfg.gateway_webhook_secret.clone(),
            Some(event_sender),
        ));

        Self {
            catalog,
            customers,
            orders,
            order_status,
            payments,
        }
    }
}
