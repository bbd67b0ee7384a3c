use std::sync::Arc;

use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::order::{self, Entity as OrderEntity, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::orders::{CreateOrderRequest, OrderService},
    services::payment_gateway::PaymentGateway,
};

type HmacSha256 = Hmac<Sha256>;

/// Response returned to the client so it can open the gateway checkout
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PaymentOrderResponse {
    pub order_id: Uuid,
    pub gateway_order_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub key_id: String,
}

/// Outcome of a verified webhook delivery. Every variant is acknowledged
/// with success to the gateway; only signature failures reject the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Payment matched a local order which is now paid/captured
    Captured { order_id: Uuid },
    /// Same payment id seen before; write skipped
    AlreadyProcessed { order_id: Uuid },
    /// Verified event referenced a gateway order we don't know
    NoMatchingOrder,
    /// Recognized envelope, unhandled event type (or unusable payload)
    Ignored,
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    #[serde(default)]
    payload: Option<WebhookPayload>,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    payment: Option<WebhookPaymentWrapper>,
}

#[derive(Debug, Deserialize)]
struct WebhookPaymentWrapper {
    entity: Option<WebhookPaymentEntity>,
}

#[derive(Debug, Deserialize)]
struct WebhookPaymentEntity {
    id: Option<String>,
    order_id: Option<String>,
}

/// Payment Initiator and Webhook Reconciler.
///
/// Initiation wraps the Order Builder, converts the total into minor units
/// and persists the gateway's order id. Reconciliation verifies webhook
/// authenticity over the raw body and idempotently transitions the matched
/// order to paid/captured.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    order_service: Arc<OrderService>,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
    key_id: String,
    webhook_secret: String,
    event_sender: Option<Arc<EventSender>>,
}

impl PaymentService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<DatabaseConnection>,
        order_service: Arc<OrderService>,
        gateway: Arc<dyn PaymentGateway>,
        currency: String,
        key_id: String,
        webhook_secret: String,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            order_service,
            gateway,
            currency,
            key_id,
            webhook_secret,
            event_sender,
        }
    }

    /// Creates a local order and a matching remote gateway order.
    ///
    /// On gateway failure the local order stays "pending" with no gateway id;
    /// it is the caller's responsibility to retry or abandon it. There is no
    /// automatic rollback of the orphaned order.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn create_payment_order(
        &self,
        user_id: Uuid,
        mut request: CreateOrderRequest,
    ) -> Result<PaymentOrderResponse, ServiceError> {
        request.payment_method = Some("razorpay".to_string());

        let details = self.order_service.create_order(user_id, request).await?;
        let order = details.order;

        let amount_minor = to_minor_units(order.total_amount)?;
        let gateway_order = self
            .gateway
            .create_order(amount_minor, &self.currency, &order.id.to_string())
            .await?;

        // Single-field update; safe to retry with the same value
        let mut active: order::ActiveModel = order.clone().into();
        active.gateway_order_id = Set(Some(gateway_order.id.clone()));
        active.update(&*self.db).await?;

        info!(
            order_id = %order.id,
            gateway_order_id = %gateway_order.id,
            amount_minor,
            "Gateway order created"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::PaymentInitiated {
                    order_id: order.id,
                    gateway_order_id: gateway_order.id.clone(),
                })
                .await
            {
                warn!(error = %e, order_id = %order.id, "Failed to send payment initiated event");
            }
        }

        Ok(PaymentOrderResponse {
            order_id: order.id,
            gateway_order_id: gateway_order.id,
            amount: order.total_amount,
            currency: self.currency.clone(),
            key_id: self.key_id.clone(),
        })
    }

    /// Handles an asynchronous gateway notification.
    ///
    /// Signature verification runs over the raw, unparsed body and precedes
    /// any JSON parsing or database lookup. Once the signature checks out the
    /// delivery is always acknowledged: unhandled event types, unusable
    /// payloads and unknown gateway order ids are logged and swallowed so the
    /// gateway stops retrying.
    #[instrument(skip_all, fields(body_len = raw_body.len()))]
    pub async fn handle_webhook(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, ServiceError> {
        let signature = signature.ok_or(ServiceError::MissingSignature)?;

        if !verify_webhook_signature(raw_body, signature, &self.webhook_secret) {
            warn!("Webhook signature verification failed");
            return Err(ServiceError::InvalidSignature);
        }

        let envelope: WebhookEnvelope = match serde_json::from_slice(raw_body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Webhook body did not parse as an event envelope");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        if envelope.event != "payment.captured" {
            info!(event = %envelope.event, "Unhandled webhook event type");
            return Ok(WebhookOutcome::Ignored);
        }

        let entity = envelope
            .payload
            .and_then(|p| p.payment)
            .and_then(|p| p.entity);
        let (payment_id, gateway_order_id) = match entity {
            Some(WebhookPaymentEntity {
                id: Some(id),
                order_id: Some(order_id),
            }) => (id, order_id),
            _ => {
                warn!("payment.captured event without payment entity ids");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        let order = OrderEntity::find()
            .filter(order::Column::GatewayOrderId.eq(gateway_order_id.as_str()))
            .one(&*self.db)
            .await?;

        let order = match order {
            Some(order) => order,
            None => {
                warn!(%gateway_order_id, "No local order for gateway order id");
                return Ok(WebhookOutcome::NoMatchingOrder);
            }
        };

        // Repeat delivery of the same payment: the transition already
        // happened with identical values, skip the write
        if order.gateway_payment_id.as_deref() == Some(payment_id.as_str()) {
            info!(order_id = %order.id, %payment_id, "Duplicate capture event, skipping");
            return Ok(WebhookOutcome::AlreadyProcessed { order_id: order.id });
        }

        let order_id = order.id;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Paid.to_string());
        active.payment_status = Set(order::PAYMENT_STATUS_CAPTURED.to_string());
        active.gateway_payment_id = Set(Some(payment_id.clone()));
        active.update(&*self.db).await?;

        info!(%order_id, %payment_id, "Order marked paid via webhook");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::PaymentCaptured {
                    order_id,
                    gateway_payment_id: payment_id,
                })
                .await
            {
                warn!(error = %e, %order_id, "Failed to send payment captured event");
            }
        }

        Ok(WebhookOutcome::Captured { order_id })
    }
}

/// Converts a decimal amount into the smallest currency unit (integer minor
/// units), rejecting amounts that do not fit.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!("Amount {} overflows minor units", amount))
        })
}

/// Verifies an HMAC-SHA256 hex signature over the raw webhook body
pub fn verify_webhook_signature(raw_body: &[u8], signature: &str, secret: &str) -> bool {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(raw_body);
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, signature)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

/// Computes the hex signature the gateway would send for `raw_body`
pub fn sign_webhook_body(raw_body: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key size");
    mac.update(raw_body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn minor_units_conversion() {
        assert_eq!(to_minor_units(dec!(1000.00)).unwrap(), 100_000);
        assert_eq!(to_minor_units(dec!(499.99)).unwrap(), 49_999);
        assert_eq!(to_minor_units(dec!(0.01)).unwrap(), 1);
        assert_eq!(to_minor_units(dec!(0)).unwrap(), 0);
        // Sub-minor fractions round instead of truncating
        assert_eq!(to_minor_units(dec!(10.991)).unwrap(), 1_099);
        assert_eq!(to_minor_units(dec!(10.999)).unwrap(), 1_100);
    }

    #[test]
    fn signature_verification_round_trip() {
        let body = br#"{"event":"payment.captured"}"#;
        let secret = "whsec_test_secret";

        let signature = sign_webhook_body(body, secret);
        assert!(verify_webhook_signature(body, &signature, secret));

        // Tampered body fails
        assert!(!verify_webhook_signature(
            br#"{"event":"payment.refunded"}"#,
            &signature,
            secret
        ));
        // Wrong secret fails
        assert!(!verify_webhook_signature(body, &signature, "other_secret"));
        // Truncated signature fails
        assert!(!verify_webhook_signature(body, &signature[..10], secret));
    }

    #[test]
    fn envelope_parsing_extracts_payment_ids() {
        let body = br#"{
            "event": "payment.captured",
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_Abc123",
                        "order_id": "order_Xyz789",
                        "amount": 100000,
                        "status": "captured"
                    }
                }
            }
        }"#;

        let envelope: WebhookEnvelope = serde_json::from_slice(body).unwrap();
        assert_eq!(envelope.event, "payment.captured");
        let entity = envelope.payload.unwrap().payment.unwrap().entity.unwrap();
        assert_eq!(entity.id.as_deref(), Some("pay_Abc123"));
        assert_eq!(entity.order_id.as_deref(), Some("order_Xyz789"));
    }

    #[tokio::test]
    async fn signature_failures_reject_before_parsing_or_lookup() {
        use crate::services::payment_gateway::MockPaymentGateway;

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_order().never();

        // A disconnected database would error on any lookup, so reaching the
        // signature error proves nothing was parsed or queried first
        let db = Arc::new(sea_orm::DatabaseConnection::Disconnected);
        let service = PaymentService::new(
            db.clone(),
            Arc::new(OrderService::new(db, None)),
            Arc::new(gateway),
            "INR".into(),
            "rzp_test_key".into(),
            "whsec_test".into(),
            None,
        );

        let body = br#"{"event":"payment.captured"}"#;
        assert!(matches!(
            service.handle_webhook(body, None).await,
            Err(ServiceError::MissingSignature)
        ));
        assert!(matches!(
            service.handle_webhook(body, Some("deadbeef")).await,
            Err(ServiceError::InvalidSignature)
        ));
    }

    #[test]
    fn envelope_tolerates_foreign_event_shapes() {
        let envelope: WebhookEnvelope =
            serde_json::from_slice(br#"{"event":"order.paid","payload":{}}"#).unwrap();
        assert_eq!(envelope.event, "order.paid");

        let envelope: WebhookEnvelope =
            serde_json::from_slice(br#"{"event":"ping"}"#).unwrap();
        assert!(envelope.payload.is_none());
    }
}
