//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `PaymentGateway` - Typed capability over the external payment processor

mod payment_gateway;

pub use payment_gateway::{
    CreatePaymentIntentRequest, Customer, GatewayError, GatewayErrorCode, PaymentGateway,
    PaymentIntent, PaymentIntentStatus, WebhookEvent, WebhookEventKind,
};
