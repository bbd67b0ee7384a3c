use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, instrument};

use crate::errors::ServiceError;

/// Remote order created at the payment gateway
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    /// Gateway-assigned order identifier, stored on the local order to
    /// correlate later webhook events
    pub id: String,
}

/// External payment gateway collaborator. The amount is always in the
/// smallest currency unit; `receipt` carries the local order id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, ServiceError>;
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    /// 1 requests auto-capture on successful payment
    payment_capture: u8,
}

/// Razorpay-style HTTP gateway client (basic auth, JSON orders API)
pub struct RazorpayGateway {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(
        base_url: String,
        key_id: String,
        key_secret: String,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            key_id,
            key_secret,
        })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    #[instrument(skip(self))]
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, ServiceError> {
        let url = format!("{}/v1/orders", self.base_url.trim_end_matches('/'));
        let body = CreateOrderBody {
            amount: amount_minor,
            currency,
            receipt,
            payment_capture: 1,
        };

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Gateway order creation request failed");
                ServiceError::PaymentGateway(format!("create order request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(%status, %detail, "Gateway rejected order creation");
            return Err(ServiceError::PaymentGateway(format!(
                "gateway returned {}: {}",
                status, detail
            )));
        }

        response.json::<GatewayOrder>().await.map_err(|e| {
            ServiceError::PaymentGateway(format!("unparseable gateway response: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{basic_auth, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn creates_remote_order_with_auto_capture() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .and(basic_auth("rzp_test_key", "rzp_test_secret"))
            .and(body_partial_json(json!({
                "amount": 100_000,
                "currency": "INR",
                "receipt": "local-order-id",
                "payment_capture": 1
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "order_ExtA1b2C3d4E5f",
                "amount": 100_000,
                "currency": "INR",
                "status": "created"
            })))
            .mount(&server)
            .await;

        let gateway = RazorpayGateway::new(
            server.uri(),
            "rzp_test_key".into(),
            "rzp_test_secret".into(),
            Duration::from_secs(5),
        )
        .unwrap();

        let order = gateway
            .create_order(100_000, "INR", "local-order-id")
            .await
            .unwrap();
        assert_eq!(order.id, "order_ExtA1b2C3d4E5f");
    }

    #[tokio::test]
    async fn surfaces_gateway_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let gateway = RazorpayGateway::new(
            server.uri(),
            "wrong".into(),
            "creds".into(),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = gateway.create_order(5_000, "INR", "receipt").await;
        assert!(matches!(err, Err(ServiceError::PaymentGateway(_))));
    }
}
