//! Access code value object.
//!
//! An access code is the short, human-enterable secret a buyer receives after
//! a successful one-time payment. It is stored only in the payment
//! processor's customer metadata and substitutes for a password at login.

use std::fmt;

use rand::Rng;

use super::errors::AccessError;

/// Metadata key under which the code is stored on the processor customer.
pub const ACCESS_CODE_KEY: &str = "accessCode";

/// Metadata key linking the customer to the paying intent.
pub const PAYMENT_INTENT_KEY: &str = "paymentIntentId";

/// Metadata key recording when the last successful payment landed.
pub const LAST_PAYMENT_DATE_KEY: &str = "lastPaymentDate";

/// An 8-character uppercase alphanumeric access code.
///
/// Canonical form is uppercase; [`AccessCode::parse`] accepts lowercase input
/// and canonicalizes it, so comparison is effectively case-insensitive.
///
/// Codes are not checked for uniqueness across customers. Login requires the
/// matching email as well, so a collision between two customers is harmless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCode(String);

impl AccessCode {
    pub const LENGTH: usize = 8;

    const ALPHABET: &'static [u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    /// Generate a fresh code, sampled uniformly over the 36^8 state space.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code: String = (0..Self::LENGTH)
            .map(|_| {
                let idx = rng.gen_range(0..Self::ALPHABET.len());
                Self::ALPHABET[idx] as char
            })
            .collect();
        AccessCode(code)
    }

    /// Parse and canonicalize a code from user input.
    pub fn parse(input: &str) -> Result<Self, AccessError> {
        let canonical = input.trim().to_uppercase();
        if canonical.len() != Self::LENGTH {
            return Err(AccessError::validation(
                "access_code",
                format!("must be exactly {} characters", Self::LENGTH),
            ));
        }
        if !canonical.bytes().all(|b| Self::ALPHABET.contains(&b)) {
            return Err(AccessError::validation(
                "access_code",
                "must contain only letters and digits",
            ));
        }
        Ok(AccessCode(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
