//! Payment gateway port for the external payment processor.
//!
//! Defines the contract for payment processor integrations (e.g., Stripe).
//! The processor's customer records are the system of record: there is no
//! first-party database, so every security-sensitive decision re-reads
//! processor state through this port.
//!
//! # Design
//!
//! - **Gateway agnostic**: Interface works with any one-time payment provider
//! - **Read-through**: Callers never treat a cached view as authoritative
//! - **Overwrite-based writes**: Metadata patches are safe to repeat

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::access::{AccessError, ACCESS_CODE_KEY, PAYMENT_INTENT_KEY};

/// Port for payment processor integrations.
///
/// Handles payment intents, customer lookup/creation, customer metadata
/// writes, and webhook signature verification.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for a one-time charge.
    ///
    /// Fails with `InvalidArgument` if the amount is not positive.
    async fn create_payment_intent(
        &self,
        request: CreatePaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Retrieve a payment intent by id. `None` if the processor no longer
    /// knows the id.
    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentIntent>, GatewayError>;

    /// Look up a customer by email. First match wins when the processor
    /// holds duplicate emails.
    async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Customer>, GatewayError>;

    /// Look up a customer by email, creating one if no match exists.
    ///
    /// Idempotent: repeated calls with the same email return the same
    /// customer.
    async fn find_or_create_customer(&self, email: &str) -> Result<Customer, GatewayError>;

    /// Create a customer record. `email` may be absent (anonymous customer
    /// for payments that carried no email).
    async fn create_customer(&self, email: Option<&str>) -> Result<Customer, GatewayError>;

    /// Retrieve a customer by id. `None` if missing or deleted remotely.
    async fn retrieve_customer(&self, customer_id: &str)
        -> Result<Option<Customer>, GatewayError>;

    /// Merge `patch` into the customer's metadata.
    ///
    /// Processor semantics: named keys are replaced, other keys preserved.
    async fn update_customer_metadata(
        &self,
        customer_id: &str,
        patch: HashMap<String, String>,
    ) -> Result<Customer, GatewayError>;

    /// Verify a webhook signature and parse the event.
    ///
    /// Returns the parsed event if valid, `InvalidWebhook` otherwise.
    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, GatewayError>;
}

/// Request to create a payment intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentIntentRequest {
    /// Charge amount in minor currency units (must be positive).
    pub amount_minor: i64,

    /// ISO currency code, lowercase (e.g., "cad").
    pub currency: String,

    /// Processor customer id to attach, when known up front.
    pub customer_id: Option<String>,

    /// Metadata stored on the intent (carries the buyer email).
    pub metadata: HashMap<String, String>,
}

/// A payment intent as the processor reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Processor's intent id (pi_...).
    pub id: String,

    /// Amount in minor currency units.
    pub amount_minor: i64,

    /// ISO currency code, lowercase.
    pub currency: String,

    /// Current status; transitions are owned entirely by the processor.
    pub status: PaymentIntentStatus,

    /// Attached customer id, if any.
    pub customer_id: Option<String>,

    /// Client secret the browser uses to confirm payment. Only present on
    /// freshly created/retrieved intents.
    pub client_secret: Option<String>,

    /// Intent metadata (carries the buyer email).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    /// Email recorded at intent creation, if any.
    pub fn email(&self) -> Option<&str> {
        self.metadata
            .get("email")
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Payment intent status from the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
    /// Unknown status from provider.
    Unknown,
}

impl PaymentIntentStatus {
    /// Whether the payment has completed successfully.
    pub fn has_succeeded(&self) -> bool {
        matches!(self, PaymentIntentStatus::Succeeded)
    }
}

/// A customer in the payment system.
///
/// This is the sole durable entitlement store: the access code lives in
/// `metadata`, nowhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Processor's customer id (cus_...).
    pub id: String,

    /// Customer email, if recorded.
    pub email: Option<String>,

    /// Flat string-to-string metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// When the customer was created (provider timestamp).
    pub created_at: i64,
}

impl Customer {
    /// Current access code, if one has been issued.
    pub fn access_code(&self) -> Option<&str> {
        self.metadata
            .get(ACCESS_CODE_KEY)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Payment intent the current code was issued for, if recorded.
    pub fn payment_intent_id(&self) -> Option<&str> {
        self.metadata
            .get(PAYMENT_INTENT_KEY)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Verified webhook event from the payment processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event id from provider (evt_...).
    pub id: String,

    /// Event kind.
    pub kind: WebhookEventKind,

    /// The payment intent the event refers to, for intent events.
    pub payment_intent: Option<PaymentIntent>,

    /// When the event occurred (Unix timestamp).
    pub created_at: i64,
}

/// Webhook event kinds this system distinguishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventKind {
    /// A one-time payment completed.
    PaymentIntentSucceeded,

    /// A payment attempt failed.
    PaymentIntentFailed,

    /// Any other event type (ignored).
    Unknown(String),
}

/// Errors from payment gateway operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayError {
    /// Error code for categorization.
    pub code: GatewayErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl GatewayError {
    pub fn new(code: GatewayErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::NetworkError, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::InvalidArgument, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(GatewayErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn invalid_webhook(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::InvalidWebhook, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::ProviderError, message)
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

impl From<GatewayError> for AccessError {
    fn from(err: GatewayError) -> Self {
        match err.code {
            GatewayErrorCode::InvalidWebhook => AccessError::SignatureInvalid,
            GatewayErrorCode::NotFound => AccessError::not_found("Remote object"),
            GatewayErrorCode::InvalidArgument => AccessError::validation("request", err.message),
            _ => AccessError::Processor(err.message),
        }
    }
}

/// Gateway error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorCode {
    /// Network connectivity issue.
    NetworkError,

    /// API authentication failed.
    AuthenticationError,

    /// Request was malformed (e.g., non-positive amount).
    InvalidArgument,

    /// Resource not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Invalid webhook signature or payload.
    InvalidWebhook,

    /// Provider API error.
    ProviderError,

    /// Unknown error.
    Unknown,
}

impl GatewayErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayErrorCode::NetworkError | GatewayErrorCode::RateLimitExceeded
        )
    }
}

impl std::fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GatewayErrorCode::NetworkError => "network_error",
            GatewayErrorCode::AuthenticationError => "authentication_error",
            GatewayErrorCode::InvalidArgument => "invalid_argument",
            GatewayErrorCode::NotFound => "not_found",
            GatewayErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            GatewayErrorCode::InvalidWebhook => "invalid_webhook",
            GatewayErrorCode::ProviderError => "provider_error",
            GatewayErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}
