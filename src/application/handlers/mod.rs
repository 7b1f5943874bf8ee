//! Application command and query handlers.

mod create_payment_intent;
mod issue_entitlement;
mod login;
mod retrieve_access_code;
mod verify_session;

pub use create_payment_intent::{
    CreatePaymentIntentCommand, CreatePaymentIntentHandler, CreatedPaymentIntent,
};
pub use issue_entitlement::{IssueEntitlementHandler, IssuedEntitlement};
pub use login::{LoginCommand, LoginHandler, LoginOutcome};
pub use retrieve_access_code::{
    wait_for_access_code, AccessCodeStatus, PendingReason, RetrieveAccessCodeHandler,
    RetrieveAccessCodeQuery, POLL_ATTEMPTS, POLL_DELAY,
};
pub use verify_session::{SessionIdentity, VerifySessionHandler};
