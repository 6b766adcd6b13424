use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::{endpoint, rejection, PaymentError};
use crate::config::RazorpayConfig;

const GATEWAY: &str = "Razorpay";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    #[serde(default)]
    pub entity: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub amount_due: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    pub status: String,
    #[serde(default)]
    pub created_at: i64,
}

impl RazorpayOrder {
    pub fn is_paid(&self) -> bool {
        self.status == "paid"
    }
}

#[derive(Debug, Serialize)]
struct CreateOrder<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    config: RazorpayConfig,
}

impl RazorpayClient {
    pub fn new(http: reqwest::Client, config: RazorpayConfig) -> Self {
        Self { http, config }
    }

    pub fn key_id(&self) -> &str {
        &self.config.key_id
    }

    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, PaymentError> {
        endpoint(&self.config.api_base, segments)
    }

    fn ensure_enabled(&self) -> Result<(), PaymentError> {
        if self.config.enabled() {
            Ok(())
        } else {
            Err(PaymentError::Disabled(GATEWAY))
        }
    }

    pub async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<RazorpayOrder, PaymentError> {
        self.ensure_enabled()?;
        let response = self
            .http
            .post(self.url(&["v1", "orders"])?)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&CreateOrder {
                amount,
                currency,
                receipt,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(GATEWAY, response).await);
        }
        Ok(response.json::<RazorpayOrder>().await?)
    }

    pub async fn fetch_order(&self, order_id: &str) -> Result<RazorpayOrder, PaymentError> {
        self.ensure_enabled()?;
        let response = self
            .http
            .get(self.url(&["v1", "orders", order_id])?)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(GATEWAY, response).await);
        }
        Ok(response.json::<RazorpayOrder>().await?)
    }

    /// Checks the checkout callback signature, `HMAC-SHA256(order_id|payment_id)`.
    pub fn verify_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), PaymentError> {
        self.ensure_enabled()?;
        verify_signature(&self.config.key_secret, order_id, payment_id, signature)
    }
}

pub fn verify_signature(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<(), PaymentError> {
    let expected = hex::decode(signature.trim()).map_err(|_| PaymentError::InvalidSignature)?;
    let mut mac = Hmac::<Sha256>::new_from_slice(key_secret.as_bytes())
        .map_err(|_| PaymentError::InvalidSignature)?;
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    mac.verify_slice(&expected)
        .map_err(|_| PaymentError::InvalidSignature)
}

#[cfg(test)]
pub(crate) fn sign(key_secret: &str, order_id: &str, payment_id: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(key_secret.as_bytes()).unwrap();
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn client(base: String) -> RazorpayClient {
        RazorpayClient::new(
            reqwest::Client::new(),
            RazorpayConfig {
                key_id: "rzp_test_key".to_string(),
                key_secret: "rzp_secret".to_string(),
                api_base: base,
            },
        )
    }

    #[test]
    fn signature_verification() {
        let signature = sign("rzp_secret", "order_1", "pay_1");
        assert!(verify_signature("rzp_secret", "order_1", "pay_1", &signature).is_ok());
        assert!(verify_signature("rzp_secret", "order_1", "pay_2", &signature).is_err());
        assert!(verify_signature("other", "order_1", "pay_1", &signature).is_err());
        assert!(verify_signature("rzp_secret", "order_1", "pay_1", "zz-not-hex").is_err());
    }

    #[actix_web::test]
    async fn disabled_without_credentials() {
        let client = RazorpayClient::new(
            reqwest::Client::new(),
            RazorpayConfig {
                key_id: String::new(),
                key_secret: String::new(),
                api_base: String::new(),
            },
        );
        assert!(matches!(
            client.create_order(100, "INR", "a1").await,
            Err(PaymentError::Disabled(_))
        ));
    }

    #[actix_web::test]
    async fn creates_order_with_basic_auth() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/orders")
                    .header_exists("authorization")
                    .json_body(json!({ "amount": 250000, "currency": "INR", "receipt": "appt-1" }));
                then.status(200).json_body(json!({
                    "id": "order_9A33XWu170gUtm",
                    "entity": "order",
                    "amount": 250000,
                    "amount_paid": 0,
                    "amount_due": 250000,
                    "currency": "INR",
                    "receipt": "appt-1",
                    "status": "created",
                    "created_at": 1700000000
                }));
            })
            .await;

        let order = client(server.base_url())
            .create_order(250_000, "INR", "appt-1")
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(order.id, "order_9A33XWu170gUtm");
        assert_eq!(order.receipt.as_deref(), Some("appt-1"));
        assert!(!order.is_paid());
    }

    #[actix_web::test]
    async fn fetches_order_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/orders/order_1");
                then.status(200).json_body(json!({
                    "id": "order_1",
                    "amount": 1000,
                    "currency": "INR",
                    "receipt": "appt-7",
                    "status": "paid"
                }));
            })
            .await;

        let order = client(server.base_url()).fetch_order("order_1").await.unwrap();
        assert!(order.is_paid());
        assert_eq!(order.receipt.as_deref(), Some("appt-7"));
    }

    #[actix_web::test]
    async fn surfaces_gateway_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/orders");
                then.status(400).json_body(json!({
                    "error": { "code": "BAD_REQUEST_ERROR", "description": "The amount must be at least INR 1.00" }
                }));
            })
            .await;

        match client(server.base_url()).create_order(10, "INR", "appt-1").await {
            Err(PaymentError::Rejected { status, message, .. }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "The amount must be at least INR 1.00");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[actix_web::test]
    async fn refuses_dot_order_ids() {
        let server = MockServer::start_async().await;
        let list = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/orders");
                then.status(200).json_body(json!({ "items": [] }));
            })
            .await;

        assert!(matches!(
            client(server.base_url()).fetch_order("..").await,
            Err(PaymentError::InvalidReference(_))
        ));
        assert_eq!(list.hits_async().await, 0);
    }
}
