//! HTTP adapter: Axum routes, handlers, and DTOs for the entitlement API.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{ApiError, AppState, CookieSettings};
pub use routes::{api_routes, app_router};
