//! Gatepass - paywall entitlement backend.
//!
//! Turns one-time Stripe payments into access codes and sessions without a
//! first-party database: the payment processor's customer metadata is the
//! only persistent store. The webhook writes an access code after a
//! successful payment; login exchanges email + code for a signed session
//! cookie; session checks re-validate against live processor state, so
//! clearing a customer's code revokes access immediately.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
