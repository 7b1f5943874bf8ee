//! HTTP DTOs for the entitlement API.
//!
//! These types define the JSON request/response structure at the HTTP
//! boundary. Field names are camelCase to match the browser clients.

use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to create a payment intent for checkout.
///
/// Fields are optional so missing values produce a 400 with a specific
/// message instead of a deserialization error.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentRequest {
    /// Charge amount in minor currency units.
    pub amount: Option<i64>,
    /// Buyer email for later payment attribution.
    pub email: Option<String>,
}

/// Query string for the access code lookup on the success page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAccessCodeParams {
    pub email: Option<String>,
    pub payment_intent_id: Option<String>,
    /// Poll briefly for the webhook to land instead of returning 404.
    #[serde(default)]
    pub wait: bool,
}

/// Login credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub access_code: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentResponse {
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCodeResponse {
    pub access_code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub customer_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

/// Session check result. Identity fields are omitted when unauthenticated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl VerifySessionResponse {
    pub fn unauthenticated() -> Self {
        Self {
            authenticated: false,
            customer_id: None,
            email: None,
        }
    }
}

/// Webhook acknowledgement. Returned even when post-verification
/// processing fails, so the sender does not retry forever.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAckResponse {
    pub received: bool,
}

/// Error envelope: `{"error": "..."}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_fields_are_camel_case() {
        let req: GetAccessCodeParams =
            serde_json::from_str(r#"{"email":"a@x.com","paymentIntentId":"pi_1"}"#).unwrap();
        assert_eq!(req.payment_intent_id.as_deref(), Some("pi_1"));
        assert!(!req.wait);
    }

    #[test]
    fn missing_fields_deserialize_to_none() {
        let req: LoginRequest = serde_json::from_str("{}").unwrap();
        assert!(req.email.is_none());
        assert!(req.access_code.is_none());
    }

    #[test]
    fn verify_session_omits_identity_when_unauthenticated() {
        let json = serde_json::to_string(&VerifySessionResponse::unauthenticated()).unwrap();
        assert_eq!(json, r#"{"authenticated":false}"#);
    }

    #[test]
    fn login_response_is_camel_case() {
        let json = serde_json::to_string(&LoginResponse {
            success: true,
            customer_id: "cus_1".to_string(),
        })
        .unwrap();
        assert!(json.contains("customerId"));
    }
}
