//! Stripe-backed payment gateway client.
//!
//! Talks to the Stripe REST API over `reqwest`: `POST /v1/checkout/sessions`
//! to open a hosted checkout session and `GET /v1/checkout/sessions/{id}` to
//! read its settlement status. The API base is configurable so tests can
//! point it at a stub server.

use super::{CheckoutSession, GatewayError, PaymentGateway, SessionRequest, SessionStatus};
use crate::config::GatewayConfig;
use crate::types::Money;
use async_trait::async_trait;
use std::time::Duration;

/// Stripe checkout-session client.
#[derive(Clone, Debug)]
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
    success_url: String,
    cancel_url: String,
}

impl StripeGateway {
    /// Builds a client from gateway configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            success_url: config.success_url.clone(),
            cancel_url: config.cancel_url.clone(),
        })
    }

    fn provider_error(body: &serde_json::Value) -> GatewayError {
        let message = body
            .pointer("/error/message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown gateway error");
        GatewayError::Provider(message.to_string())
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: SessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let amount = request.amount.cents().to_string();
        let product_name = format!("Order {}", request.order_id);
        let order_id = request.order_id.to_string();
        let user_id = request.user_id.to_string();

        let form: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("payment_method_types[0]", "card"),
            ("line_items[0][price_data][currency]", &request.currency),
            ("line_items[0][price_data][product_data][name]", &product_name),
            ("line_items[0][price_data][unit_amount]", &amount),
            ("line_items[0][quantity]", "1"),
            ("success_url", &self.success_url),
            ("cancel_url", &self.cancel_url),
            ("metadata[order_id]", &order_id),
            ("metadata[user_id]", &user_id),
        ];

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(Self::provider_error(&body));
        }

        let session_id = body
            .get("id")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| GatewayError::Provider("response missing session id".to_string()))?
            .to_string();
        let checkout_url = body
            .get("url")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| GatewayError::Provider("response missing checkout url".to_string()))?
            .to_string();

        tracing::info!(%session_id, order_id = %request.order_id, "checkout session opened");

        Ok(CheckoutSession {
            session_id,
            checkout_url,
        })
    }

    async fn get_session_status(&self, session_id: &str) -> Result<SessionStatus, GatewayError> {
        let response = self
            .client
            .get(format!(
                "{}/v1/checkout/sessions/{session_id}",
                self.api_base
            ))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(Self::provider_error(&body));
        }

        let payment_status = body
            .get("payment_status")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let success = payment_status == "paid";
        let amount = body
            .get("amount_total")
            .and_then(serde_json::Value::as_u64)
            .map(Money::from_cents);

        Ok(SessionStatus {
            success,
            failure_reason: (!success).then(|| format!("session status is {payment_status}")),
            status: payment_status,
            amount,
            raw: body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_extracts_message() {
        let body = serde_json::json!({"error": {"message": "Invalid API Key"}});
        let err = StripeGateway::provider_error(&body);
        assert_eq!(
            err.to_string(),
            "gateway rejected request: Invalid API Key"
        );
    }

    #[test]
    fn provider_error_tolerates_opaque_bodies() {
        let err = StripeGateway::provider_error(&serde_json::json!({}));
        assert!(err.to_string().contains("unknown gateway error"));
    }
}
