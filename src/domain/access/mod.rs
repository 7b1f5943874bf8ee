//! Entitlement domain - access codes and session credentials.
//!
//! All durable entitlement state lives in the payment processor's customer
//! records; this module holds only the value objects and token logic layered
//! over that state.

mod access_code;
mod errors;
mod session;

pub use access_code::{
    AccessCode, ACCESS_CODE_KEY, LAST_PAYMENT_DATE_KEY, PAYMENT_INTENT_KEY,
};
pub use errors::AccessError;
pub use session::{SessionClaims, SessionToken, SessionTokenService};
