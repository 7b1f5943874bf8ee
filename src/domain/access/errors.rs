//! Error types for the entitlement domain.

use thiserror::Error;

/// Errors raised by the entitlement pipeline.
///
/// Variants map to the HTTP taxonomy at the adapter boundary: validation
/// failures become 400, lookups 404, credential failures 401, processor
/// failures 500. Messages for credential failures are deliberately generic
/// so callers cannot tell which check failed.
#[derive(Debug, Clone, Error)]
pub enum AccessError {
    #[error("Validation failed for '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("Invalid email or access code")]
    InvalidCredentials,

    #[error("Payment not completed")]
    PaymentNotCompleted,

    /// Bounded polling exhausted without a code appearing.
    #[error("Access code still processing after {attempts} attempts")]
    StillProcessing { attempts: u32 },

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Invalid webhook signature")]
    SignatureInvalid,

    #[error("Payment processor error: {0}")]
    Processor(String),
}

impl AccessError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AccessError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AccessError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn processor(message: impl Into<String>) -> Self {
        AccessError::Processor(message.into())
    }
}
