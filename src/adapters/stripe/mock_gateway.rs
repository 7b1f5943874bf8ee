//! In-memory payment gateway for tests and local development.
//!
//! Stores customers and payment intents in mutex-guarded maps so handler
//! tests can drive the whole entitlement flow without touching Stripe.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ports::{
    CreatePaymentIntentRequest, Customer, GatewayError, PaymentGateway, PaymentIntent,
    PaymentIntentStatus, WebhookEvent, WebhookEventKind,
};

/// How the mock treats incoming webhook payloads.
#[derive(Debug, Clone)]
pub enum MockWebhookMode {
    /// Accept any payload and return the queued event (or a default one).
    AcceptAll,
    /// Reject every payload as unsigned.
    AlwaysFail,
}

/// In-memory gateway double.
pub struct MockGateway {
    customers: Mutex<HashMap<String, Customer>>,
    intents: Mutex<HashMap<String, PaymentIntent>>,
    next_id: AtomicU64,
    next_error: Mutex<Option<GatewayError>>,
    next_webhook_event: Mutex<Option<WebhookEvent>>,
    webhook_mode: Mutex<MockWebhookMode>,
    call_log: Mutex<Vec<String>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            customers: Mutex::new(HashMap::new()),
            intents: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            next_error: Mutex::new(None),
            next_webhook_event: Mutex::new(None),
            webhook_mode: Mutex::new(MockWebhookMode::AcceptAll),
            call_log: Mutex::new(Vec::new()),
        }
    }

    /// Queue an error for the next gateway call.
    pub fn set_next_error(&self, error: GatewayError) {
        *self.next_error.lock().unwrap() = Some(error);
    }

    /// Queue the event the next `verify_webhook` call returns.
    pub fn set_next_webhook_event(&self, event: WebhookEvent) {
        *self.next_webhook_event.lock().unwrap() = Some(event);
    }

    pub fn set_webhook_mode(&self, mode: MockWebhookMode) {
        *self.webhook_mode.lock().unwrap() = mode;
    }

    /// Seed a customer directly.
    pub fn insert_customer(&self, customer: Customer) {
        self.customers
            .lock()
            .unwrap()
            .insert(customer.id.clone(), customer);
    }

    /// Seed a payment intent directly.
    pub fn insert_payment_intent(&self, intent: PaymentIntent) {
        self.intents
            .lock()
            .unwrap()
            .insert(intent.id.clone(), intent);
    }

    /// Snapshot a stored customer.
    pub fn customer(&self, customer_id: &str) -> Option<Customer> {
        self.customers.lock().unwrap().get(customer_id).cloned()
    }

    /// Names of the gateway methods called, in order.
    pub fn calls(&self) -> Vec<String> {
        self.call_log.lock().unwrap().clone()
    }

    fn record(&self, method: &str) {
        self.call_log.lock().unwrap().push(method.to_string());
    }

    fn take_error(&self) -> Option<GatewayError> {
        self.next_error.lock().unwrap().take()
    }

    fn allocate_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("{}_mock_{}", prefix, n)
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_payment_intent(
        &self,
        request: CreatePaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        self.record("create_payment_intent");
        if let Some(err) = self.take_error() {
            return Err(err);
        }

        if request.amount_minor <= 0 {
            return Err(GatewayError::invalid_argument("Amount must be positive"));
        }

        let id = self.allocate_id("pi");
        let intent = PaymentIntent {
            id: id.clone(),
            amount_minor: request.amount_minor,
            currency: request.currency,
            status: PaymentIntentStatus::RequiresPaymentMethod,
            customer_id: request.customer_id,
            client_secret: Some(format!("{}_secret_mock", id)),
            metadata: request.metadata,
        };

        self.intents.lock().unwrap().insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentIntent>, GatewayError> {
        self.record("retrieve_payment_intent");
        if let Some(err) = self.take_error() {
            return Err(err);
        }

        Ok(self.intents.lock().unwrap().get(payment_intent_id).cloned())
    }

    async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Customer>, GatewayError> {
        self.record("find_customer_by_email");
        if let Some(err) = self.take_error() {
            return Err(err);
        }

        Ok(self
            .customers
            .lock()
            .unwrap()
            .values()
            .find(|c| c.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_or_create_customer(&self, email: &str) -> Result<Customer, GatewayError> {
        self.record("find_or_create_customer");
        if let Some(err) = self.take_error() {
            return Err(err);
        }

        let existing = self
            .customers
            .lock()
            .unwrap()
            .values()
            .find(|c| c.email.as_deref() == Some(email))
            .cloned();

        if let Some(customer) = existing {
            return Ok(customer);
        }

        self.create_customer(Some(email)).await
    }

    async fn create_customer(&self, email: Option<&str>) -> Result<Customer, GatewayError> {
        self.record("create_customer");
        if let Some(err) = self.take_error() {
            return Err(err);
        }

        let customer = Customer {
            id: self.allocate_id("cus"),
            email: email.map(str::to_string),
            metadata: HashMap::new(),
            created_at: chrono::Utc::now().timestamp(),
        };

        self.customers
            .lock()
            .unwrap()
            .insert(customer.id.clone(), customer.clone());
        Ok(customer)
    }

    async fn retrieve_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Customer>, GatewayError> {
        self.record("retrieve_customer");
        if let Some(err) = self.take_error() {
            return Err(err);
        }

        Ok(self.customers.lock().unwrap().get(customer_id).cloned())
    }

    async fn update_customer_metadata(
        &self,
        customer_id: &str,
        patch: HashMap<String, String>,
    ) -> Result<Customer, GatewayError> {
        self.record("update_customer_metadata");
        if let Some(err) = self.take_error() {
            return Err(err);
        }

        let mut customers = self.customers.lock().unwrap();
        let customer = customers
            .get_mut(customer_id)
            .ok_or_else(|| GatewayError::not_found("No such customer"))?;

        // Stripe merges keys; an empty string value clears a key.
        customer.metadata.extend(patch);
        Ok(customer.clone())
    }

    async fn verify_webhook(
        &self,
        _payload: &[u8],
        _signature: &str,
    ) -> Result<WebhookEvent, GatewayError> {
        self.record("verify_webhook");
        if let Some(err) = self.take_error() {
            return Err(err);
        }

        let mode = self.webhook_mode.lock().unwrap().clone();
        match mode {
            MockWebhookMode::AlwaysFail => {
                Err(GatewayError::invalid_webhook("Invalid signature"))
            }
            MockWebhookMode::AcceptAll => {
                let queued = self.next_webhook_event.lock().unwrap().take();
                Ok(queued.unwrap_or(WebhookEvent {
                    id: "evt_mock".to_string(),
                    kind: WebhookEventKind::Unknown("mock".to_string()),
                    payment_intent: None,
                    created_at: chrono::Utc::now().timestamp(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_retrieve_payment_intent() {
        let gateway = MockGateway::new();
        let created = gateway
            .create_payment_intent(CreatePaymentIntentRequest {
                amount_minor: 2500,
                currency: "cad".to_string(),
                customer_id: None,
                metadata: HashMap::from([("email".to_string(), "a@x.com".to_string())]),
            })
            .await
            .unwrap();

        assert!(created.client_secret.is_some());

        let fetched = gateway
            .retrieve_payment_intent(&created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.email(), Some("a@x.com"));
    }

    #[tokio::test]
    async fn find_or_create_customer_is_idempotent_per_email() {
        let gateway = MockGateway::new();
        let first = gateway.find_or_create_customer("a@x.com").await.unwrap();
        let second = gateway.find_or_create_customer("a@x.com").await.unwrap();
        assert_eq!(first.id, second.id);

        let other = gateway.find_or_create_customer("b@x.com").await.unwrap();
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn update_customer_metadata_merges_keys() {
        let gateway = MockGateway::new();
        let customer = gateway.find_or_create_customer("a@x.com").await.unwrap();

        gateway
            .update_customer_metadata(
                &customer.id,
                HashMap::from([("accessCode".to_string(), "AB12CD34".to_string())]),
            )
            .await
            .unwrap();

        let updated = gateway
            .update_customer_metadata(
                &customer.id,
                HashMap::from([("paymentIntentId".to_string(), "pi_1".to_string())]),
            )
            .await
            .unwrap();

        assert_eq!(updated.metadata.get("accessCode").unwrap(), "AB12CD34");
        assert_eq!(updated.metadata.get("paymentIntentId").unwrap(), "pi_1");
    }

    #[tokio::test]
    async fn update_metadata_fails_for_missing_customer() {
        let gateway = MockGateway::new();
        let err = gateway
            .update_customer_metadata("cus_nope", HashMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::ports::GatewayErrorCode::NotFound);
    }

    #[tokio::test]
    async fn queued_error_is_returned_once() {
        let gateway = MockGateway::new();
        gateway.set_next_error(GatewayError::network("connection reset"));

        assert!(gateway.retrieve_customer("cus_1").await.is_err());
        assert!(gateway.retrieve_customer("cus_1").await.is_ok());
    }

    #[tokio::test]
    async fn webhook_always_fail_mode() {
        let gateway = MockGateway::new();
        gateway.set_webhook_mode(MockWebhookMode::AlwaysFail);

        let err = gateway.verify_webhook(b"{}", "sig").await.unwrap_err();
        assert_eq!(err.code, crate::ports::GatewayErrorCode::InvalidWebhook);
    }

    #[tokio::test]
    async fn webhook_returns_queued_event() {
        let gateway = MockGateway::new();
        gateway.set_next_webhook_event(WebhookEvent {
            id: "evt_1".to_string(),
            kind: WebhookEventKind::PaymentIntentSucceeded,
            payment_intent: None,
            created_at: 0,
        });

        let event = gateway.verify_webhook(b"{}", "sig").await.unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.kind, WebhookEventKind::PaymentIntentSucceeded);
    }
}
