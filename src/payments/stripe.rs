use serde::{Deserialize, Serialize};

use super::{endpoint, rejection, PaymentError};
use crate::config::StripeConfig;

const GATEWAY: &str = "Stripe";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub payment_status: String,
    #[serde(default)]
    pub client_reference_id: Option<String>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub amount: i64,
    pub currency: &'a str,
    pub product_name: &'a str,
    pub reference: &'a str,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutRequest<'_> {
    fn form(&self) -> Vec<(&'static str, String)> {
        vec![
            ("mode", "payment".to_string()),
            ("success_url", self.success_url.clone()),
            ("cancel_url", self.cancel_url.clone()),
            ("client_reference_id", self.reference.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            (
                "line_items[0][price_data][currency]",
                self.currency.to_lowercase(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                self.product_name.to_string(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                self.amount.to_string(),
            ),
        ]
    }
}

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    config: StripeConfig,
}

impl StripeClient {
    pub fn new(http: reqwest::Client, config: StripeConfig) -> Self {
        Self { http, config }
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

    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession, PaymentError> {
        self.ensure_enabled()?;
        let response = self
            .http
            .post(self.url(&["v1", "checkout", "sessions"])?)
            .bearer_auth(&self.config.secret_key)
            .form(&request.form())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(GATEWAY, response).await);
        }
        Ok(response.json::<CheckoutSession>().await?)
    }

    pub async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, PaymentError> {
        self.ensure_enabled()?;
        let response = self
            .http
            .get(self.url(&["v1", "checkout", "sessions", session_id])?)
            .bearer_auth(&self.config.secret_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(GATEWAY, response).await);
        }
        Ok(response.json::<CheckoutSession>().await?)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn client(base: String) -> StripeClient {
        StripeClient::new(
            reqwest::Client::new(),
            StripeConfig {
                secret_key: "sk_test_123".to_string(),
                api_base: base,
            },
        )
    }

    fn request() -> CheckoutRequest<'static> {
        CheckoutRequest {
            amount: 250_000,
            currency: "INR",
            product_name: "Appointment Fees",
            reference: "appt-1",
            success_url: "http://localhost:5173/verify?success=true&appointmentId=appt-1".to_string(),
            cancel_url: "http://localhost:5173/verify?success=false&appointmentId=appt-1".to_string(),
        }
    }

    #[test]
    fn form_uses_lowercase_currency_and_single_line_item() {
        let form = request().form();
        assert!(form.contains(&("line_items[0][price_data][currency]", "inr".to_string())));
        assert!(form.contains(&("line_items[0][price_data][unit_amount]", "250000".to_string())));
        assert!(form.contains(&("client_reference_id", "appt-1".to_string())));
    }

    #[actix_web::test]
    async fn creates_checkout_session() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/checkout/sessions")
                    .header("authorization", "Bearer sk_test_123")
                    .x_www_form_urlencoded_tuple("mode", "payment")
                    .x_www_form_urlencoded_tuple("client_reference_id", "appt-1");
                then.status(200).json_body(json!({
                    "id": "cs_test_1",
                    "url": "https://checkout.stripe.com/c/pay/cs_test_1",
                    "payment_status": "unpaid",
                    "client_reference_id": "appt-1"
                }));
            })
            .await;

        let session = client(server.base_url())
            .create_checkout_session(&request())
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(session.url.as_deref(), Some("https://checkout.stripe.com/c/pay/cs_test_1"));
        assert!(!session.is_paid());
    }

    #[actix_web::test]
    async fn retrieves_paid_session() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/checkout/sessions/cs_test_1");
                then.status(200).json_body(json!({
                    "id": "cs_test_1",
                    "payment_status": "paid",
                    "client_reference_id": "appt-1"
                }));
            })
            .await;

        let session = client(server.base_url())
            .retrieve_session("cs_test_1")
            .await
            .unwrap();
        assert!(session.is_paid());
        assert_eq!(session.client_reference_id.as_deref(), Some("appt-1"));
    }

    #[actix_web::test]
    async fn surfaces_gateway_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/checkout/sessions/missing");
                then.status(404).json_body(json!({
                    "error": { "message": "No such checkout.session: 'missing'" }
                }));
            })
            .await;

        match client(server.base_url()).retrieve_session("missing").await {
            Err(PaymentError::Rejected { status, message, .. }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "No such checkout.session: 'missing'");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[actix_web::test]
    async fn refuses_dot_session_ids() {
        let server = MockServer::start_async().await;
        let list = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/checkout/sessions");
                then.status(200).json_body(json!({ "data": [] }));
            })
            .await;

        assert!(matches!(
            client(server.base_url()).retrieve_session("..").await,
            Err(PaymentError::InvalidReference(_))
        ));
        assert_eq!(list.hits_async().await, 0);
    }
}
