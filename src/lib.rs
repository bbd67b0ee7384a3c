//! Storefront API library.
//!
//! Accounts, catalog, orders and payment-gateway reconciliation for a small
//! storefront backend.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod openapi;
pub mod services;

use axum::{extract::State, response::Json, routing::get, Router};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::AuthRouterExt;
use crate::entities::user::ROLE_ADMIN;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub auth_service: Arc<auth::AuthService>,
    pub services: handlers::AppServices,
}

// Common query parameters for list endpoints
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

pub(crate) fn default_page() -> u64 {
    1
}
pub(crate) fn default_limit() -> u64 {
    20
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let limit = limit.max(1);
        let total_pages = total.div_ceil(limit);
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

// Full v1 API surface
pub fn api_v1_routes() -> Router<AppState> {
    // Public auth endpoints
    let auth_routes = Router::new()
        .route("/auth/signup", axum::routing::post(handlers::auth::signup))
        .route("/auth/login", axum::routing::post(handlers::auth::login))
        .route(
            "/auth/google",
            axum::routing::post(handlers::auth::google_login),
        );

    // Public catalog reads
    let products_read = Router::new()
        .route("/products", get(handlers::products::list_products))
        .route("/products/:slug", get(handlers::products::get_product));

    // Catalog mutations are restricted to administrators
    let products_admin = Router::new()
        .route(
            "/products",
            axum::routing::post(handlers::products::create_product),
        )
        .route(
            "/products/:slug",
            axum::routing::put(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        )
        .with_role(ROLE_ADMIN);

    // Profile and saved addresses
    let users = Router::new()
        .route(
            "/users/me",
            get(handlers::users::me).put(handlers::users::update_me),
        )
        .route(
            "/users/me/addresses",
            get(handlers::users::list_addresses)
                .post(handlers::users::create_address),
        )
        .route(
            "/users/me/addresses/:id",
            axum::routing::put(handlers::users::update_address)
                .delete(handlers::users::delete_address),
        )
        .with_auth();

    // Orders: list/create/read for authenticated users; the status authority
    // enforces the admin requirement itself
    let orders = Router::new()
        .route(
            "/orders",
            get(handlers::orders::list_orders).post(handlers::orders::create_order),
        )
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/orders/:id/status",
            axum::routing::patch(handlers::orders::update_order_status),
        )
        .with_auth();

    // Payment initiation requires auth
    let payments = Router::new()
        .route(
            "/payments/create-order",
            axum::routing::post(handlers::payments::create_payment_order),
        )
        .with_auth();

    // Webhook does not require auth; it is signature-verified
    let payment_webhook = Router::new().route(
        "/payments/webhook",
        axum::routing::post(handlers::payment_webhooks::payment_webhook),
    );

    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .merge(auth_routes)
        .merge(products_read)
        .merge(products_admin)
        .merge(users)
        .merge(orders)
        .merge(payments)
        .merge(payment_webhook)
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "storefront-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn pagination_math() {
        let page: PaginatedResponse<u32> = PaginatedResponse::new(vec![1, 2, 3], 41, 1, 20);
        assert_eq!(page.total_pages, 3);

        let empty: PaginatedResponse<u32> = PaginatedResponse::new(vec![], 0, 1, 20);
        assert_eq!(empty.total_pages, 0);

        // A zero limit is clamped rather than dividing by zero
        let clamped: PaginatedResponse<u32> = PaginatedResponse::new(vec![], 5, 1, 0);
        assert_eq!(clamped.total_pages, 5);
    }

    #[test]
    fn success_and_error_wrappers() {
        let ok = ApiResponse::success(42);
        assert!(ok.success);
        assert_eq!(ok.data, Some(42));

        let err = ApiResponse::<u32>::error("nope".into());
        assert!(!err.success);
        assert_eq!(err.message.as_deref(), Some("nope"));
    }
}
