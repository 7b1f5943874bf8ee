//! Turn a successful payment event into an access code.
//!
//! This is the webhook's write path: generate a fresh code, find or create
//! the paying customer, and store the code in the customer's metadata at the
//! payment processor. No first-party database is involved.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::access::{
    AccessCode, AccessError, ACCESS_CODE_KEY, LAST_PAYMENT_DATE_KEY, PAYMENT_INTENT_KEY,
};
use crate::ports::{PaymentGateway, WebhookEvent, WebhookEventKind};

/// Outcome of a processed success event.
#[derive(Debug, Clone)]
pub struct IssuedEntitlement {
    pub customer_id: String,
    pub access_code: AccessCode,
    pub payment_intent_id: String,
}

pub struct IssueEntitlementHandler {
    gateway: Arc<dyn PaymentGateway>,
}

impl IssueEntitlementHandler {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { gateway }
    }

    /// Process a verified webhook event.
    ///
    /// Returns `Ok(None)` for events that need no action. A repeated
    /// success event for the same payment writes a fresh code, replacing
    /// the previous one.
    pub async fn handle(
        &self,
        event: WebhookEvent,
    ) -> Result<Option<IssuedEntitlement>, AccessError> {
        match event.kind {
            WebhookEventKind::PaymentIntentSucceeded => {}
            WebhookEventKind::PaymentIntentFailed => {
                if let Some(intent) = &event.payment_intent {
                    tracing::warn!(
                        payment_intent_id = %intent.id,
                        "Payment failed"
                    );
                }
                return Ok(None);
            }
            WebhookEventKind::Unknown(kind) => {
                tracing::debug!(event_kind = %kind, "Ignoring unhandled event type");
                return Ok(None);
            }
        }

        let intent = event.payment_intent.ok_or_else(|| {
            AccessError::Processor("Success event carried no payment intent".to_string())
        })?;

        let access_code = AccessCode::generate();

        // Prefer the customer already attached to the intent; fall back to
        // the email recorded at checkout, then to an anonymous customer.
        let attached = match &intent.customer_id {
            Some(id) => self.gateway.retrieve_customer(id).await?,
            None => None,
        };

        let customer = match attached {
            Some(customer) => customer,
            None => match intent.email() {
                Some(email) => self.gateway.find_or_create_customer(email).await?,
                None => {
                    tracing::warn!(
                        payment_intent_id = %intent.id,
                        "Payment intent has no email metadata, creating anonymous customer"
                    );
                    self.gateway.create_customer(None).await?
                }
            },
        };

        let patch = HashMap::from([
            (ACCESS_CODE_KEY.to_string(), access_code.as_str().to_string()),
            (PAYMENT_INTENT_KEY.to_string(), intent.id.clone()),
            (
                LAST_PAYMENT_DATE_KEY.to_string(),
                chrono::Utc::now().to_rfc3339(),
            ),
        ]);

        self.gateway
            .update_customer_metadata(&customer.id, patch)
            .await?;

        tracing::info!(
            customer_id = %customer.id,
            payment_intent_id = %intent.id,
            "Access code issued"
        );

        Ok(Some(IssuedEntitlement {
            customer_id: customer.id,
            access_code,
            payment_intent_id: intent.id,
        }))
    }
}
