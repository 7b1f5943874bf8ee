//! Validate a session token against live processor state.
//!
//! A valid token is necessary but not sufficient: the customer must still
//! exist at the processor and still carry an access code. Clearing the
//! code in the processor dashboard revokes every outstanding session
//! without any first-party state.

use std::sync::Arc;

use crate::domain::access::{AccessError, SessionTokenService};
use crate::ports::PaymentGateway;

/// The identity behind a live session.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub customer_id: String,
    pub email: Option<String>,
}

pub struct VerifySessionHandler {
    gateway: Arc<dyn PaymentGateway>,
    sessions: Arc<SessionTokenService>,
}

impl VerifySessionHandler {
    pub fn new(gateway: Arc<dyn PaymentGateway>, sessions: Arc<SessionTokenService>) -> Self {
        Self { gateway, sessions }
    }

    pub async fn handle(&self, token: &str) -> Result<SessionIdentity, AccessError> {
        let claims = self.sessions.decode(token)?;

        // Any processor failure here reads as "not authenticated" rather
        // than surfacing an internal error to an unauthenticated caller.
        let customer = self
            .gateway
            .retrieve_customer(&claims.sub)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Customer lookup failed during session check");
                AccessError::Unauthenticated
            })?
            .ok_or(AccessError::Unauthenticated)?;

        if customer.access_code().is_none() {
            tracing::info!(
                customer_id = %customer.id,
                "Session rejected, access code revoked"
            );
            return Err(AccessError::Unauthenticated);
        }

        // The linked payment must still read as succeeded, so a refunded or
        // reversed purchase ends the session too.
        if let Some(payment_intent_id) = customer.payment_intent_id() {
            let intent = self
                .gateway
                .retrieve_payment_intent(payment_intent_id)
                .await
                .map_err(|e| {
                    tracing::warn!(error = %e, "Payment lookup failed during session check");
                    AccessError::Unauthenticated
                })?
                .ok_or(AccessError::Unauthenticated)?;

            if !intent.status.has_succeeded() {
                tracing::info!(
                    customer_id = %customer.id,
                    payment_intent_id,
                    "Session rejected, linked payment no longer succeeded"
                );
                return Err(AccessError::Unauthenticated);
            }
        }

        Ok(SessionIdentity {
            customer_id: customer.id,
            email: customer.email,
        })
    }
}
