//! Session token issuance and decoding.
//!
//! The session credential is a signed HS256 JWT carrying the processor
//! customer id and issuance/expiry timestamps. The token is only a pointer,
//! never an authorization decision: every privileged request re-validates
//! the referenced customer against live processor state (see
//! `VerifySessionHandler`), so clearing a customer's metadata revokes the
//! session on the very next check.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::errors::AccessError;

/// Claims embedded in a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Processor customer id.
    pub sub: String,
    /// Issued-at, epoch seconds.
    pub iat: i64,
    /// Expiry, epoch seconds.
    pub exp: i64,
}

/// An issued session token plus its timestamps.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub token: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Issues and decodes session tokens with a shared signing secret.
pub struct SessionTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl SessionTokenService {
    /// Create a service from a signing secret and a TTL in days.
    pub fn new(secret: &SecretString, ttl_days: i64) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            ttl_secs: ttl_days * 24 * 60 * 60,
        }
    }

    /// Issue a token for a customer.
    pub fn issue(&self, customer_id: &str) -> Result<SessionToken, AccessError> {
        let issued_at = Utc::now().timestamp();
        let expires_at = issued_at + self.ttl_secs;
        let claims = SessionClaims {
            sub: customer_id.to_string(),
            iat: issued_at,
            exp: expires_at,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to sign session token");
                AccessError::processor("Failed to issue session token")
            })?;

        Ok(SessionToken {
            token,
            issued_at,
            expires_at,
        })
    }

    /// Decode and validate a token's signature and expiry.
    ///
    /// Any malformed, tampered, or expired token yields `Unauthenticated`
    /// without detail; the caller still has to re-check processor state.
    pub fn decode(&self, token: &str) -> Result<SessionClaims, AccessError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Session token rejected");
                AccessError::Unauthenticated
            })
    }
}
