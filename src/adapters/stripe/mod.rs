//! Stripe adapter for the payment gateway port.

mod gateway;
mod mock_gateway;
mod webhook_types;

pub use gateway::{StripeConfig, StripeGateway};
pub use mock_gateway::{MockGateway, MockWebhookMode};
pub use webhook_types::{SignatureHeader, SignatureParseError};
