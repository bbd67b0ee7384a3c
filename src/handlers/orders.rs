use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::{order::Model as OrderModel, order_item::Model as OrderItemModel},
    errors::ServiceError,
    services::orders::{CreateOrderRequest, OrderDetails},
    ApiResponse, AppState, ListQuery, PaginatedResponse,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
}

impl From<OrderItemModel> for OrderItemResponse {
    fn from(item: OrderItemModel) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            quantity: item.quantity,
            price_at_purchase: item.price_at_purchase,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customer_name: Option<String>,
    pub phone: Option<String>,
    pub payment_method: String,
    pub status: String,
    pub payment_status: String,
    pub total_amount: Decimal,
    pub shipping_address: Option<serde_json::Value>,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
}

impl OrderResponse {
    fn from_model(order: OrderModel, items: Vec<OrderItemModel>) -> Self {
        // The snapshot was serialized at creation; surface it as JSON again
        let shipping_address = order
            .shipping_address
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());

        Self {
            id: order.id,
            user_id: order.user_id,
            customer_name: order.customer_name,
            phone: order.phone,
            payment_method: order.payment_method,
            status: order.status,
            payment_status: order.payment_status,
            total_amount: order.total_amount,
            shipping_address,
            items: items.into_iter().map(Into::into).collect(),
            created_at: order.created_at,
        }
    }
}

impl From<OrderDetails> for OrderResponse {
    fn from(details: OrderDetails) -> Self {
        Self::from_model(details.order, details.items)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    /// Target status, matched case-sensitively against the recognized values
    pub status: String,
}

/// List orders. Admins see every order; users see their own. Newest first.
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
    ),
    responses(
        (status = 200, description = "Orders retrieved", body = ApiResponse<PaginatedResponse<OrderResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderResponse>>>, ServiceError> {
    let scope = if auth_user.is_admin() {
        None
    } else {
        Some(auth_user.user_id)
    };

    let (orders, total) = state
        .services
        .orders
        .list_orders(scope, query.page, query.limit)
        .await?;

    let items = orders
        .into_iter()
        .map(|order| OrderResponse::from_model(order, Vec::new()))
        .collect();

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items,
        total,
        query.page,
        query.limit,
    ))))
}

/// Get one order with its items
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order found", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let details = state.services.orders.get_order(id).await?;

    // Users may only read their own orders
    if !auth_user.is_admin() && details.order.user_id != auth_user.user_id {
        return Err(ServiceError::NotFound(format!("Order {} not found", id)));
    }

    Ok(Json(ApiResponse::success(details.into())))
}

/// Create a cash-on-delivery order
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    let details = state
        .services
        .orders
        .create_order(auth_user.user_id, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(details.into())),
    ))
}

/// Update an order's fulfillment status (admin only)
#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Unrecognized status", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .order_status
        .set_status(id, &request.status, &auth_user)
        .await?;

    Ok(Json(ApiResponse::success(OrderResponse::from_model(
        order,
        Vec::new(),
    ))))
}
