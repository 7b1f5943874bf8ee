//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `access` - Access codes, session tokens, and the entitlement error taxonomy

pub mod access;
