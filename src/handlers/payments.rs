use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::orders::CreateOrderRequest,
    services::payments::PaymentOrderResponse,
    ApiResponse, AppState,
};

/// Create an order and a matching payment-gateway order.
///
/// The client is expected to open the gateway checkout with the returned
/// gateway order id; confirmation arrives later through the webhook.
#[utoipa::path(
    post,
    path = "/api/v1/payments/create-order",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Gateway order created", body = ApiResponse<PaymentOrderResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway failure; local order stays pending", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Payments"
)]
pub async fn create_payment_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentOrderResponse>>), ServiceError> {
    let response = state
        .services
        .payments
        .create_payment_order(auth_user.user_id, request)
        .await?;

    info!(
        order_id = %response.order_id,
        gateway_order_id = %response.gateway_order_id,
        "Payment order created"
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}
