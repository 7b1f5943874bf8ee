//! Create a payment intent for a one-time purchase.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::access::AccessError;
use crate::ports::{CreatePaymentIntentRequest, PaymentGateway};

/// Command carried by the checkout page.
#[derive(Debug, Clone)]
pub struct CreatePaymentIntentCommand {
    /// Charge amount in minor currency units.
    pub amount_minor: i64,
    /// Buyer email, attached to the intent metadata so the webhook can
    /// attribute the payment later. Optional; anonymous checkouts still
    /// get a code, retrievable from the processor dashboard.
    pub email: Option<String>,
}

/// Result handed back to the checkout page.
#[derive(Debug, Clone)]
pub struct CreatedPaymentIntent {
    pub client_secret: String,
}

pub struct CreatePaymentIntentHandler {
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
}

impl CreatePaymentIntentHandler {
    pub fn new(gateway: Arc<dyn PaymentGateway>, currency: impl Into<String>) -> Self {
        Self {
            gateway,
            currency: currency.into(),
        }
    }

    pub async fn handle(
        &self,
        command: CreatePaymentIntentCommand,
    ) -> Result<CreatedPaymentIntent, AccessError> {
        if command.amount_minor <= 0 {
            return Err(AccessError::validation("amount", "Amount is required"));
        }

        let email = command
            .email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());

        // Resolving the customer up front attaches the charge to the same
        // record the webhook will write the access code to.
        let customer_id = match &email {
            Some(email) => Some(self.gateway.find_or_create_customer(email).await?.id),
            None => None,
        };

        let metadata = match &email {
            Some(email) => HashMap::from([("email".to_string(), email.clone())]),
            None => HashMap::new(),
        };

        let intent = self
            .gateway
            .create_payment_intent(CreatePaymentIntentRequest {
                amount_minor: command.amount_minor,
                currency: self.currency.clone(),
                customer_id,
                metadata,
            })
            .await?;

        tracing::info!(
            payment_intent_id = %intent.id,
            amount_minor = command.amount_minor,
            "Payment intent created"
        );

        let client_secret = intent.client_secret.ok_or_else(|| {
            AccessError::Processor("Payment processor returned no client secret".to_string())
        })?;

        Ok(CreatedPaymentIntent { client_secret })
    }
}
