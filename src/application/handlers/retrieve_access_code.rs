//! Look up the access code displayed on the post-payment success page.
//!
//! The webhook that writes the code races against the buyer's redirect, so
//! a single lookup can legitimately find nothing yet. The handler reports
//! that as a pending status rather than an error; `wait_for_access_code`
//! wraps it in a bounded poll for callers that want to block briefly.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::access::AccessError;
use crate::ports::PaymentGateway;

/// How many lookups `wait_for_access_code` makes before giving up.
pub const POLL_ATTEMPTS: u32 = 5;

/// Fixed delay between poll attempts.
pub const POLL_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct RetrieveAccessCodeQuery {
    pub email: String,
    pub payment_intent_id: String,
}

/// Lookup outcome for a payment that has succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessCodeStatus {
    /// The webhook has run and the code is stored.
    Ready { access_code: String },
    /// The payment succeeded but the webhook has not landed yet.
    Pending(PendingReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingReason {
    /// No customer record exists for the email yet.
    CustomerNotFound,
    /// The customer exists but carries no access code.
    CodeMissing,
}

pub struct RetrieveAccessCodeHandler {
    gateway: Arc<dyn PaymentGateway>,
}

impl RetrieveAccessCodeHandler {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { gateway }
    }

    pub async fn handle(
        &self,
        query: RetrieveAccessCodeQuery,
    ) -> Result<AccessCodeStatus, AccessError> {
        let email = query.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AccessError::validation("email", "Email is required"));
        }

        let payment_intent_id = query.payment_intent_id.trim();
        if payment_intent_id.is_empty() {
            return Err(AccessError::validation(
                "paymentIntentId",
                "Payment intent ID is required",
            ));
        }

        let intent = self
            .gateway
            .retrieve_payment_intent(payment_intent_id)
            .await?
            .ok_or_else(|| AccessError::not_found("Payment"))?;

        if !intent.status.has_succeeded() {
            return Err(AccessError::PaymentNotCompleted);
        }

        let Some(customer) = self.gateway.find_customer_by_email(&email).await? else {
            tracing::debug!(
                payment_intent_id,
                "No customer for email yet, webhook pending"
            );
            return Ok(AccessCodeStatus::Pending(PendingReason::CustomerNotFound));
        };

        match customer.access_code() {
            Some(code) => Ok(AccessCodeStatus::Ready {
                access_code: code.to_string(),
            }),
            None => {
                tracing::debug!(
                    customer_id = %customer.id,
                    payment_intent_id,
                    "Customer has no access code yet, webhook pending"
                );
                Ok(AccessCodeStatus::Pending(PendingReason::CodeMissing))
            }
        }
    }
}

/// Poll until the access code is written or the attempt budget runs out.
///
/// Payment-state and validation errors abort immediately. Exhausting the
/// budget yields `StillProcessing` so callers can tell the buyer to check
/// back, not that anything is wrong.
pub async fn wait_for_access_code(
    handler: &RetrieveAccessCodeHandler,
    query: RetrieveAccessCodeQuery,
) -> Result<String, AccessError> {
    for attempt in 1..=POLL_ATTEMPTS {
        match handler.handle(query.clone()).await? {
            AccessCodeStatus::Ready { access_code } => return Ok(access_code),
            AccessCodeStatus::Pending(reason) => {
                tracing::debug!(attempt, ?reason, "Access code not ready");
                if attempt < POLL_ATTEMPTS {
                    tokio::time::sleep(POLL_DELAY).await;
                }
            }
        }
    }

    Err(AccessError::StillProcessing {
        attempts: POLL_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::stripe::MockGateway;
    use crate::ports::{Customer, PaymentIntent, PaymentIntentStatus};
    use std::collections::HashMap;

    fn intent(id: &str, status: PaymentIntentStatus) -> PaymentIntent {
        PaymentIntent {
            id: id.to_string(),
            amount_minor: 2500,
            currency: "cad".to_string(),
            status,
            customer_id: None,
            client_secret: None,
            metadata: HashMap::new(),
        }
    }

    fn customer(id: &str, email: &str, metadata: HashMap<String, String>) -> Customer {
        Customer {
            id: id.to_string(),
            email: Some(email.to_string()),
            metadata,
            created_at: 0,
        }
    }

    fn query(email: &str, pi: &str) -> RetrieveAccessCodeQuery {
        RetrieveAccessCodeQuery {
            email: email.to_string(),
            payment_intent_id: pi.to_string(),
        }
    }

    #[tokio::test]
    async fn returns_code_when_stored() {
        let gateway = Arc::new(MockGateway::new());
        gateway.insert_payment_intent(intent("pi_1", PaymentIntentStatus::Succeeded));
        gateway.insert_customer(customer(
            "cus_1",
            "a@x.com",
            HashMap::from([("accessCode".to_string(), "AB12CD34".to_string())]),
        ));

        let status = RetrieveAccessCodeHandler::new(gateway)
            .handle(query("a@x.com", "pi_1"))
            .await
            .unwrap();

        assert_eq!(
            status,
            AccessCodeStatus::Ready {
                access_code: "AB12CD34".to_string()
            }
        );
    }

    #[tokio::test]
    async fn rejects_missing_fields() {
        let gateway = Arc::new(MockGateway::new());
        let handler = RetrieveAccessCodeHandler::new(gateway);

        let err = handler.handle(query("", "pi_1")).await.unwrap_err();
        assert!(matches!(err, AccessError::Validation { .. }));

        let err = handler.handle(query("a@x.com", "  ")).await.unwrap_err();
        assert!(matches!(err, AccessError::Validation { .. }));
    }

    #[tokio::test]
    async fn rejects_unknown_payment() {
        let gateway = Arc::new(MockGateway::new());
        let err = RetrieveAccessCodeHandler::new(gateway)
            .handle(query("a@x.com", "pi_missing"))
            .await
            .unwrap_err();

        assert!(matches!(err, AccessError::NotFound { .. }));
    }

    #[tokio::test]
    async fn rejects_incomplete_payment() {
        let gateway = Arc::new(MockGateway::new());
        gateway.insert_payment_intent(intent("pi_1", PaymentIntentStatus::Processing));

        let err = RetrieveAccessCodeHandler::new(gateway)
            .handle(query("a@x.com", "pi_1"))
            .await
            .unwrap_err();

        assert!(matches!(err, AccessError::PaymentNotCompleted));
    }

    #[tokio::test]
    async fn pending_when_customer_missing() {
        let gateway = Arc::new(MockGateway::new());
        gateway.insert_payment_intent(intent("pi_1", PaymentIntentStatus::Succeeded));

        let status = RetrieveAccessCodeHandler::new(gateway)
            .handle(query("a@x.com", "pi_1"))
            .await
            .unwrap();

        assert_eq!(
            status,
            AccessCodeStatus::Pending(PendingReason::CustomerNotFound)
        );
    }

    #[tokio::test]
    async fn pending_when_code_missing() {
        let gateway = Arc::new(MockGateway::new());
        gateway.insert_payment_intent(intent("pi_1", PaymentIntentStatus::Succeeded));
        gateway.insert_customer(customer("cus_1", "a@x.com", HashMap::new()));

        let status = RetrieveAccessCodeHandler::new(gateway)
            .handle(query("a@x.com", "pi_1"))
            .await
            .unwrap();

        assert_eq!(status, AccessCodeStatus::Pending(PendingReason::CodeMissing));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_gives_up_after_budget() {
        let gateway = Arc::new(MockGateway::new());
        gateway.insert_payment_intent(intent("pi_1", PaymentIntentStatus::Succeeded));
        let handler = RetrieveAccessCodeHandler::new(gateway);

        let err = wait_for_access_code(&handler, query("a@x.com", "pi_1"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AccessError::StillProcessing {
                attempts: POLL_ATTEMPTS
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_picks_up_code_written_mid_poll() {
        let gateway = Arc::new(MockGateway::new());
        gateway.insert_payment_intent(intent("pi_1", PaymentIntentStatus::Succeeded));
        let handler = RetrieveAccessCodeHandler::new(gateway.clone());

        let writer = {
            let gateway = gateway.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                gateway.insert_customer(customer(
                    "cus_1",
                    "a@x.com",
                    HashMap::from([("accessCode".to_string(), "ZZ99XX11".to_string())]),
                ));
            })
        };

        let code = wait_for_access_code(&handler, query("a@x.com", "pi_1"))
            .await
            .unwrap();

        writer.await.unwrap();
        assert_eq!(code, "ZZ99XX11");
    }

    #[tokio::test]
    async fn wait_aborts_on_payment_error() {
        let gateway = Arc::new(MockGateway::new());
        gateway.insert_payment_intent(intent("pi_1", PaymentIntentStatus::Canceled));
        let handler = RetrieveAccessCodeHandler::new(gateway);

        let err = wait_for_access_code(&handler, query("a@x.com", "pi_1"))
            .await
            .unwrap_err();

        assert!(matches!(err, AccessError::PaymentNotCompleted));
    }
}
