use axum::{extract::State, http::HeaderMap, Json};
use bytes::Bytes;
use serde_json::{json, Value};

use crate::{errors::ServiceError, AppState};

const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Gateway webhook endpoint. Unauthenticated; authenticity comes from the
/// HMAC signature over the raw body. The body must stay unparsed until the
/// signature has been verified, so the handler takes raw bytes.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Webhook acknowledged"),
        (status = 400, description = "Missing or invalid signature", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ServiceError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    state
        .services
        .payments
        .handle_webhook(&body, signature)
        .await?;

    // Every verified delivery is acknowledged, matched or not
    Ok(Json(json!({ "status": "ok" })))
}
