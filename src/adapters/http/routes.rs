//! Axum router configuration for the entitlement API.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    create_payment_intent, get_access_code, handle_webhook, login, logout, verify_session,
    AppState,
};

/// Create the entitlement API router.
///
/// # Routes
///
/// ## Checkout
/// - `POST /create-payment-intent` - Start a one-time payment
/// - `GET /get-access-code` - Fetch the code after a successful payment
///
/// ## Sessions
/// - `POST /login` - Exchange email + access code for a session cookie
/// - `POST /logout` - Clear the session cookie
/// - `GET /verify-session` - Check the current session
///
/// ## Webhooks (no auth, signature verified)
/// - `POST /webhook` - Handle payment processor events
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/create-payment-intent", post(create_payment_intent))
        .route("/get-access-code", get(get_access_code))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/verify-session", get(verify_session))
        .route("/webhook", post(handle_webhook))
}

/// Create the complete application router, mounted at `/api`.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .route("/health", get(health))
        .with_state(state)
}

/// GET /health - liveness probe.
async fn health() -> &'static str {
    "ok"
}
