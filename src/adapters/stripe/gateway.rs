//! Stripe payment gateway adapter.
//!
//! Implements the `PaymentGateway` trait against the Stripe REST API.
//! Covers payment intents, customer lookup/creation, metadata writes, and
//! webhook signature verification.
//!
//! # Security
//!
//! - HMAC-SHA256 signature verification with constant-time comparison
//! - Timestamp validation (5-minute window) for replay attack prevention
//! - Secrets handled via `secrecy::SecretString`

use std::collections::HashMap;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::ports::{
    CreatePaymentIntentRequest, Customer, GatewayError, PaymentGateway, PaymentIntent,
    WebhookEvent, WebhookEventKind,
};

use super::webhook_types::{
    hex_encode, SignatureHeader, StripeCustomer, StripeCustomerList, StripeEvent,
    StripePaymentIntent,
};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age for webhook events (5 minutes).
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps (60 seconds).
const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Webhook signing secret (whsec_...).
    webhook_secret: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Whether to reject test-mode events in production.
    require_livemode: bool,
}

impl StripeConfig {
    /// Create a new Stripe configuration.
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: "https://api.stripe.com".to_string(),
            require_livemode: false,
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Require livemode events in production.
    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }
}

/// Stripe gateway adapter.
pub struct StripeGateway {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    /// Verify webhook signature using HMAC-SHA256.
    ///
    /// Constant-time comparison; timestamp bounded to a replay window.
    fn verify_signature(
        &self,
        payload: &[u8],
        header: &SignatureHeader,
    ) -> Result<(), GatewayError> {
        let now = chrono::Utc::now().timestamp();
        let age = now - header.timestamp;

        if age > MAX_TIMESTAMP_AGE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                age_secs = age,
                "Webhook event too old - possible replay attack"
            );
            return Err(GatewayError::invalid_webhook(format!(
                "Event too old ({} seconds)",
                age
            )));
        }

        if age < -MAX_FUTURE_TOLERANCE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                "Webhook event from future - clock skew or manipulation"
            );
            return Err(GatewayError::invalid_webhook("Event timestamp in future"));
        }

        let signed_payload = format!(
            "{}.{}",
            header.timestamp,
            String::from_utf8_lossy(payload)
        );

        let mut mac = HmacSha256::new_from_slice(
            self.config.webhook_secret.expose_secret().as_bytes(),
        )
        .expect("HMAC can take key of any size");

        mac.update(signed_payload.as_bytes());
        let expected = mac.finalize().into_bytes();

        let expected_bytes: &[u8] = expected.as_slice();
        let provided_bytes: &[u8] = &header.v1_signature;

        if expected_bytes.ct_eq(provided_bytes).unwrap_u8() != 1 {
            tracing::warn!(
                expected_signature = hex_encode(expected_bytes),
                "Invalid webhook signature"
            );
            return Err(GatewayError::invalid_webhook("Invalid signature"));
        }

        Ok(())
    }

    /// Parse a Stripe event payload into the port's event type.
    fn parse_event(&self, payload: &[u8]) -> Result<WebhookEvent, GatewayError> {
        let stripe_event: StripeEvent = serde_json::from_slice(payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse webhook payload");
            GatewayError::invalid_webhook(format!("Invalid JSON: {}", e))
        })?;

        if self.config.require_livemode && !stripe_event.livemode {
            tracing::warn!(
                event_id = %stripe_event.id,
                "Rejected test mode event in production"
            );
            return Err(GatewayError::invalid_webhook(
                "Test mode events not allowed in production",
            ));
        }

        let kind = match stripe_event.event_type.as_str() {
            "payment_intent.succeeded" => WebhookEventKind::PaymentIntentSucceeded,
            "payment_intent.payment_failed" => WebhookEventKind::PaymentIntentFailed,
            other => WebhookEventKind::Unknown(other.to_string()),
        };

        // Only intent events carry an object we care about; anything else
        // passes through with no payload.
        let payment_intent = if matches!(
            kind,
            WebhookEventKind::PaymentIntentSucceeded | WebhookEventKind::PaymentIntentFailed
        ) {
            let pi: StripePaymentIntent = serde_json::from_value(stripe_event.data.object)
                .map_err(|e| {
                    GatewayError::invalid_webhook(format!("Invalid payment intent: {}", e))
                })?;
            Some(pi.into())
        } else {
            None
        };

        Ok(WebhookEvent {
            id: stripe_event.id,
            kind,
            payment_intent,
            created_at: stripe_event.created,
        })
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
        context: &str,
    ) -> Result<T, GatewayError> {
        let response = self
            .http_client
            .post(url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params)
            .send()
            .await
            .map_err(|e| GatewayError::network(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(error = %error_text, context, "Stripe API call failed");
            return Err(GatewayError::provider(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        response.json().await.map_err(|e| {
            GatewayError::provider(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payment_intent(
        &self,
        request: CreatePaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        if request.amount_minor <= 0 {
            return Err(GatewayError::invalid_argument("Amount must be positive"));
        }

        let url = format!("{}/v1/payment_intents", self.config.api_base_url);

        // Owned keys so metadata entries can be formatted in place.
        let mut params: Vec<(String, String)> = vec![
            ("amount".to_string(), request.amount_minor.to_string()),
            ("currency".to_string(), request.currency.clone()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];

        if let Some(customer_id) = &request.customer_id {
            params.push(("customer".to_string(), customer_id.clone()));
        }

        for (key, value) in &request.metadata {
            params.push((format!("metadata[{}]", key), value.clone()));
        }

        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(&params)
            .send()
            .await
            .map_err(|e| GatewayError::network(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(error = %error_text, "Stripe create_payment_intent failed");
            return Err(GatewayError::provider(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        let stripe_intent: StripePaymentIntent = response.json().await.map_err(|e| {
            GatewayError::provider(format!("Failed to parse Stripe response: {}", e))
        })?;

        Ok(stripe_intent.into())
    }

    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentIntent>, GatewayError> {
        let url = format!(
            "{}/v1/payment_intents/{}",
            self.config.api_base_url, payment_intent_id
        );

        let response = self
            .http_client
            .get(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| GatewayError::network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GatewayError::provider(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        let stripe_intent: StripePaymentIntent = response.json().await.map_err(|e| {
            GatewayError::provider(format!("Failed to parse Stripe response: {}", e))
        })?;

        Ok(Some(stripe_intent.into()))
    }

    async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Customer>, GatewayError> {
        let url = format!("{}/v1/customers", self.config.api_base_url);

        let response = self
            .http_client
            .get(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .query(&[("email", email), ("limit", "1")])
            .send()
            .await
            .map_err(|e| GatewayError::network(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(error = %error_text, "Stripe customer list failed");
            return Err(GatewayError::provider(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        let list: StripeCustomerList = response.json().await.map_err(|e| {
            GatewayError::provider(format!("Failed to parse Stripe response: {}", e))
        })?;

        // First match wins when duplicates exist.
        Ok(list.data.into_iter().next().map(Into::into))
    }

    async fn find_or_create_customer(&self, email: &str) -> Result<Customer, GatewayError> {
        if let Some(existing) = self.find_customer_by_email(email).await? {
            return Ok(existing);
        }

        self.create_customer(Some(email)).await
    }

    async fn create_customer(&self, email: Option<&str>) -> Result<Customer, GatewayError> {
        let url = format!("{}/v1/customers", self.config.api_base_url);

        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(email) = email {
            params.push(("email", email.to_string()));
        }

        let stripe_customer: StripeCustomer =
            self.post_form(&url, &params, "create_customer").await?;

        Ok(stripe_customer.into())
    }

    async fn retrieve_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Customer>, GatewayError> {
        let url = format!("{}/v1/customers/{}", self.config.api_base_url, customer_id);

        let response = self
            .http_client
            .get(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| GatewayError::network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GatewayError::provider(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        let stripe_customer: StripeCustomer = response.json().await.map_err(|e| {
            GatewayError::provider(format!("Failed to parse Stripe response: {}", e))
        })?;

        if stripe_customer.deleted {
            return Ok(None);
        }

        Ok(Some(stripe_customer.into()))
    }

    async fn update_customer_metadata(
        &self,
        customer_id: &str,
        patch: HashMap<String, String>,
    ) -> Result<Customer, GatewayError> {
        let url = format!("{}/v1/customers/{}", self.config.api_base_url, customer_id);

        let params: Vec<(String, String)> = patch
            .into_iter()
            .map(|(k, v)| (format!("metadata[{}]", k), v))
            .collect();

        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(&params)
            .send()
            .await
            .map_err(|e| GatewayError::network(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(error = %error_text, "Stripe update_customer_metadata failed");
            return Err(GatewayError::provider(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        let stripe_customer: StripeCustomer = response.json().await.map_err(|e| {
            GatewayError::provider(format!("Failed to parse Stripe response: {}", e))
        })?;

        Ok(stripe_customer.into())
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, GatewayError> {
        let header = SignatureHeader::parse(signature).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse Stripe-Signature header");
            GatewayError::invalid_webhook(e.to_string())
        })?;

        self.verify_signature(payload, &header)?;

        let event = self.parse_event(payload)?;

        tracing::info!(
            event_id = %event.id,
            event_kind = ?event.kind,
            "Webhook signature verified"
        );

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PaymentIntentStatus;

    fn test_config() -> StripeConfig {
        StripeConfig::new("sk_test_key", "whsec_test_secret")
    }

    fn create_test_signature(secret: &str, timestamp: i64, payload: &str) -> String {
        let signed_payload = format!("{}.{}", timestamp, payload);
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signed_payload.as_bytes());
        let result = mac.finalize().into_bytes();

        format!("t={},v1={}", timestamp, hex_encode(&result))
    }

    fn succeeded_event_payload() -> String {
        r#"{
            "id": "evt_test123",
            "type": "payment_intent.succeeded",
            "created": 1704067200,
            "data": {
                "object": {
                    "id": "pi_test",
                    "amount": 2500,
                    "currency": "cad",
                    "status": "succeeded",
                    "customer": null,
                    "metadata": {"email": "a@x.com"}
                }
            },
            "livemode": false
        }"#
        .to_string()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn config_new_sets_defaults() {
        let config = StripeConfig::new("api_key", "webhook_secret");
        assert_eq!(config.api_base_url, "https://api.stripe.com");
        assert!(!config.require_livemode);
    }

    #[test]
    fn config_with_base_url() {
        let config = StripeConfig::new("key", "secret").with_base_url("http://localhost:8080");
        assert_eq!(config.api_base_url, "http://localhost:8080");
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Signature Verification Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn verify_signature_valid() {
        let gateway = StripeGateway::new(test_config());
        let payload = r#"{"id":"evt_test"}"#;
        let timestamp = chrono::Utc::now().timestamp();
        let signature = create_test_signature("whsec_test_secret", timestamp, payload);

        let header = SignatureHeader::parse(&signature).unwrap();
        assert!(gateway.verify_signature(payload.as_bytes(), &header).is_ok());
    }

    #[test]
    fn verify_signature_wrong_secret() {
        let gateway = StripeGateway::new(test_config());
        let payload = r#"{"id":"evt_test"}"#;
        let timestamp = chrono::Utc::now().timestamp();
        let signature = create_test_signature("wrong_secret", timestamp, payload);

        let header = SignatureHeader::parse(&signature).unwrap();
        let result = gateway.verify_signature(payload.as_bytes(), &header);

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().code,
            crate::ports::GatewayErrorCode::InvalidWebhook
        );
    }

    #[test]
    fn verify_signature_expired_timestamp() {
        let gateway = StripeGateway::new(test_config());
        let payload = r#"{"id":"evt_test"}"#;
        let old_timestamp = chrono::Utc::now().timestamp() - 600;
        let signature = create_test_signature("whsec_test_secret", old_timestamp, payload);

        let header = SignatureHeader::parse(&signature).unwrap();
        let result = gateway.verify_signature(payload.as_bytes(), &header);

        assert!(result.unwrap_err().message.contains("too old"));
    }

    #[test]
    fn verify_signature_future_timestamp() {
        let gateway = StripeGateway::new(test_config());
        let payload = r#"{"id":"evt_test"}"#;
        let future_timestamp = chrono::Utc::now().timestamp() + 120;
        let signature = create_test_signature("whsec_test_secret", future_timestamp, payload);

        let header = SignatureHeader::parse(&signature).unwrap();
        let result = gateway.verify_signature(payload.as_bytes(), &header);

        assert!(result.unwrap_err().message.contains("future"));
    }

    #[test]
    fn verify_signature_small_future_tolerance() {
        let gateway = StripeGateway::new(test_config());
        let payload = r#"{"id":"evt_test"}"#;
        // 30 seconds of clock skew is tolerated.
        let timestamp = chrono::Utc::now().timestamp() + 30;
        let signature = create_test_signature("whsec_test_secret", timestamp, payload);

        let header = SignatureHeader::parse(&signature).unwrap();
        assert!(gateway.verify_signature(payload.as_bytes(), &header).is_ok());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Event Parsing Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn parse_succeeded_event() {
        let gateway = StripeGateway::new(test_config());
        let event = gateway
            .parse_event(succeeded_event_payload().as_bytes())
            .unwrap();

        assert_eq!(event.id, "evt_test123");
        assert_eq!(event.kind, WebhookEventKind::PaymentIntentSucceeded);
        let intent = event.payment_intent.unwrap();
        assert_eq!(intent.id, "pi_test");
        assert_eq!(intent.status, PaymentIntentStatus::Succeeded);
        assert_eq!(intent.email(), Some("a@x.com"));
    }

    #[test]
    fn parse_payment_failed_event() {
        let gateway = StripeGateway::new(test_config());
        let payload = r#"{
            "id": "evt_fail",
            "type": "payment_intent.payment_failed",
            "created": 1704067200,
            "data": {
                "object": {
                    "id": "pi_fail",
                    "amount": 2500,
                    "currency": "cad",
                    "status": "requires_payment_method",
                    "customer": null,
                    "metadata": {}
                }
            },
            "livemode": false
        }"#;

        let event = gateway.parse_event(payload.as_bytes()).unwrap();
        assert_eq!(event.kind, WebhookEventKind::PaymentIntentFailed);
        assert!(event.payment_intent.is_some());
    }

    #[test]
    fn parse_unknown_event_type() {
        let gateway = StripeGateway::new(test_config());
        let payload = r#"{
            "id": "evt_unknown",
            "type": "charge.refunded",
            "created": 1704067200,
            "data": {"object": {"foo": "bar"}},
            "livemode": false
        }"#;

        let event = gateway.parse_event(payload.as_bytes()).unwrap();
        assert!(matches!(
            event.kind,
            WebhookEventKind::Unknown(ref s) if s == "charge.refunded"
        ));
        assert!(event.payment_intent.is_none());
    }

    #[test]
    fn parse_rejects_test_mode_in_production() {
        let config = StripeConfig::new("key", "secret").with_require_livemode(true);
        let gateway = StripeGateway::new(config);

        let result = gateway.parse_event(succeeded_event_payload().as_bytes());
        assert!(result.unwrap_err().message.contains("Test mode"));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Full verify_webhook Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn verify_webhook_valid_signature_and_payload() {
        let gateway = StripeGateway::new(test_config());
        let payload = succeeded_event_payload();
        let timestamp = chrono::Utc::now().timestamp();
        let signature = create_test_signature("whsec_test_secret", timestamp, &payload);

        let event = gateway
            .verify_webhook(payload.as_bytes(), &signature)
            .await
            .unwrap();

        assert_eq!(event.id, "evt_test123");
        assert_eq!(event.kind, WebhookEventKind::PaymentIntentSucceeded);
    }

    #[tokio::test]
    async fn verify_webhook_rejects_invalid_signature() {
        let gateway = StripeGateway::new(test_config());
        let payload = r#"{"id":"evt_test"}"#;
        let signature = "t=1704067200,v1=aabbccdd";

        assert!(gateway
            .verify_webhook(payload.as_bytes(), signature)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn verify_webhook_rejects_malformed_header() {
        let gateway = StripeGateway::new(test_config());
        let payload = r#"{"id":"evt_test"}"#;

        assert!(gateway
            .verify_webhook(payload.as_bytes(), "malformed_header")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn verify_webhook_rejects_invalid_json() {
        let gateway = StripeGateway::new(test_config());
        let payload = "not valid json";
        let timestamp = chrono::Utc::now().timestamp();
        let signature = create_test_signature("whsec_test_secret", timestamp, payload);

        let result = gateway.verify_webhook(payload.as_bytes(), &signature).await;
        assert!(result.unwrap_err().message.contains("Invalid JSON"));
    }

    #[tokio::test]
    async fn create_payment_intent_rejects_non_positive_amount() {
        let gateway = StripeGateway::new(test_config());
        let request = CreatePaymentIntentRequest {
            amount_minor: 0,
            currency: "cad".to_string(),
            customer_id: None,
            metadata: HashMap::new(),
        };

        let err = gateway.create_payment_intent(request).await.unwrap_err();
        assert_eq!(err.code, crate::ports::GatewayErrorCode::InvalidArgument);
    }
}
