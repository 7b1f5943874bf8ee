//! Exchange email + access code for a session token.
//!
//! Credentials are checked against live processor state: the customer's
//! stored code must match and, when a payment is on record, it must still
//! read as succeeded. All credential failures collapse into one generic
//! error so a caller cannot tell which half was wrong.

use std::sync::Arc;

use crate::domain::access::{AccessCode, AccessError, SessionToken, SessionTokenService};
use crate::ports::PaymentGateway;

#[derive(Debug, Clone)]
pub struct LoginCommand {
    pub email: String,
    pub access_code: String,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub customer_id: String,
    pub session: SessionToken,
}

pub struct LoginHandler {
    gateway: Arc<dyn PaymentGateway>,
    sessions: Arc<SessionTokenService>,
}

impl LoginHandler {
    pub fn new(gateway: Arc<dyn PaymentGateway>, sessions: Arc<SessionTokenService>) -> Self {
        Self { gateway, sessions }
    }

    pub async fn handle(&self, command: LoginCommand) -> Result<LoginOutcome, AccessError> {
        let email = command.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AccessError::validation("email", "Email is required"));
        }

        // Normalizes case and whitespace; malformed input can never match
        // a stored code, so it fails the same way a wrong code does.
        let submitted = AccessCode::parse(&command.access_code)
            .map_err(|_| AccessError::InvalidCredentials)?;

        let customer = self
            .gateway
            .find_customer_by_email(&email)
            .await?
            .ok_or(AccessError::InvalidCredentials)?;

        let stored = customer
            .access_code()
            .ok_or(AccessError::InvalidCredentials)?;

        if stored != submitted.as_str() {
            tracing::debug!(customer_id = %customer.id, "Access code mismatch");
            return Err(AccessError::InvalidCredentials);
        }

        // When a payment is on record it must still read as succeeded at
        // the processor. Codes issued without one (dashboard grants, older
        // customers) stand on their own.
        if let Some(payment_intent_id) = customer.payment_intent_id() {
            let intent = self
                .gateway
                .retrieve_payment_intent(payment_intent_id)
                .await?
                .ok_or(AccessError::PaymentNotCompleted)?;

            if !intent.status.has_succeeded() {
                tracing::warn!(
                    customer_id = %customer.id,
                    payment_intent_id,
                    status = ?intent.status,
                    "Login with non-succeeded payment"
                );
                return Err(AccessError::PaymentNotCompleted);
            }
        }

        let session = self.sessions.issue(&customer.id)?;

        tracing::info!(customer_id = %customer.id, "Login succeeded");

        Ok(LoginOutcome {
            customer_id: customer.id,
            session,
        })
    }
}
