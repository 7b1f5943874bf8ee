//! HTTP handlers for the entitlement API.
//!
//! These handlers connect Axum routes to the application layer and own the
//! session cookie lifecycle.

use std::sync::Arc;

use axum::extract::{Json, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::application::handlers::{
    wait_for_access_code, AccessCodeStatus, CreatePaymentIntentCommand,
    CreatePaymentIntentHandler, IssueEntitlementHandler, LoginCommand, LoginHandler,
    PendingReason, RetrieveAccessCodeHandler, RetrieveAccessCodeQuery, VerifySessionHandler,
};
use crate::domain::access::{AccessError, SessionTokenService};
use crate::ports::PaymentGateway;

use super::dto::{
    AccessCodeResponse, CreatePaymentIntentRequest, CreatePaymentIntentResponse, ErrorResponse,
    GetAccessCodeParams, LoginRequest, LoginResponse, LogoutResponse, VerifySessionResponse,
    WebhookAckResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Session cookie parameters shared by login, logout, and verification.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    /// Set the `Secure` attribute (on in production, off for local HTTP).
    pub secure: bool,
    pub max_age_days: i64,
}

/// Shared application state, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn PaymentGateway>,
    pub sessions: Arc<SessionTokenService>,
    pub currency: String,
    pub cookie: CookieSettings,
}

impl AppState {
    /// Create handlers on demand from the shared state.
    pub fn create_payment_intent_handler(&self) -> CreatePaymentIntentHandler {
        CreatePaymentIntentHandler::new(self.gateway.clone(), self.currency.clone())
    }

    pub fn issue_entitlement_handler(&self) -> IssueEntitlementHandler {
        IssueEntitlementHandler::new(self.gateway.clone())
    }

    pub fn retrieve_access_code_handler(&self) -> RetrieveAccessCodeHandler {
        RetrieveAccessCodeHandler::new(self.gateway.clone())
    }

    pub fn login_handler(&self) -> LoginHandler {
        LoginHandler::new(self.gateway.clone(), self.sessions.clone())
    }

    pub fn verify_session_handler(&self) -> VerifySessionHandler {
        VerifySessionHandler::new(self.gateway.clone(), self.sessions.clone())
    }

    fn session_cookie(&self, token: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.cookie.name.clone(), token);
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_secure(self.cookie.secure);
        cookie.set_path("/");
        cookie.set_max_age(time::Duration::days(self.cookie.max_age_days));
        cookie
    }

    fn expired_session_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.cookie.name.clone(), "");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_secure(self.cookie.secure);
        cookie.set_path("/");
        cookie.set_max_age(time::Duration::ZERO);
        cookie
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/create-payment-intent
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentIntentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let amount = request
        .amount
        .ok_or_else(|| ApiError::bad_request("Amount is required"))?;

    let handler = state.create_payment_intent_handler();
    let result = handler
        .handle(CreatePaymentIntentCommand {
            amount_minor: amount,
            email: request.email,
        })
        .await?;

    Ok(Json(CreatePaymentIntentResponse {
        client_secret: result.client_secret,
    }))
}

/// POST /api/webhook
///
/// Signature failures are rejected with 400. Failures after the signature
/// checks out are logged and acknowledged with 200 anyway: the sender's
/// retries would hit the same error, and an unacknowledged event would be
/// redelivered forever.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("No signature"))?;

    let event = state
        .gateway
        .verify_webhook(&body, signature)
        .await
        .map_err(AccessError::from)?;

    let handler = state.issue_entitlement_handler();
    if let Err(error) = handler.handle(event).await {
        tracing::error!(%error, "Webhook processing failed after verification");
    }

    Ok(Json(WebhookAckResponse { received: true }))
}

/// GET /api/get-access-code
pub async fn get_access_code(
    State(state): State<AppState>,
    Query(params): Query<GetAccessCodeParams>,
) -> Result<impl IntoResponse, ApiError> {
    let email = params
        .email
        .ok_or_else(|| ApiError::bad_request("Email and payment intent ID are required"))?;
    let payment_intent_id = params
        .payment_intent_id
        .ok_or_else(|| ApiError::bad_request("Email and payment intent ID are required"))?;

    let handler = state.retrieve_access_code_handler();
    let query = RetrieveAccessCodeQuery {
        email,
        payment_intent_id,
    };

    if params.wait {
        let access_code = wait_for_access_code(&handler, query).await?;
        return Ok(Json(AccessCodeResponse { access_code }));
    }

    match handler.handle(query).await? {
        AccessCodeStatus::Ready { access_code } => Ok(Json(AccessCodeResponse { access_code })),
        AccessCodeStatus::Pending(PendingReason::CustomerNotFound) => {
            Err(ApiError::not_found("Customer not found"))
        }
        AccessCodeStatus::Pending(PendingReason::CodeMissing) => Err(ApiError::not_found(
            "Access code not found. Please contact support.",
        )),
    }
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(email), Some(access_code)) = (request.email, request.access_code) else {
        return Err(ApiError::bad_request("Email and access code are required"));
    };

    let handler = state.login_handler();
    let outcome = handler
        .handle(LoginCommand { email, access_code })
        .await
        .map_err(|e| match e {
            // An unpaid entitlement is a credential problem here.
            AccessError::PaymentNotCompleted => ApiError::unauthorized("Payment not completed"),
            other => ApiError::from(other),
        })?;

    let jar = jar.add(state.session_cookie(outcome.session.token));

    Ok((
        jar,
        Json(LoginResponse {
            success: true,
            customer_id: outcome.customer_id,
        }),
    ))
}

/// POST /api/logout
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let jar = jar.add(state.expired_session_cookie());
    (jar, Json(LogoutResponse { success: true }))
}

/// GET /api/verify-session
///
/// Never errors: a missing, invalid, or revoked session yields a 401 with
/// `{"authenticated": false}` so clients branch on one shape.
pub async fn verify_session(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let Some(cookie) = jar.get(&state.cookie.name) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(VerifySessionResponse::unauthenticated()),
        );
    };

    let handler = state.verify_session_handler();
    match handler.handle(cookie.value()).await {
        Ok(identity) => (
            StatusCode::OK,
            Json(VerifySessionResponse {
                authenticated: true,
                customer_id: Some(identity.customer_id),
                email: identity.email,
            }),
        ),
        Err(_) => (
            StatusCode::UNAUTHORIZED,
            Json(VerifySessionResponse::unauthenticated()),
        ),
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts application errors to HTTP responses.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        let status = match &err {
            AccessError::Validation { .. }
            | AccessError::PaymentNotCompleted
            | AccessError::SignatureInvalid => StatusCode::BAD_REQUEST,
            AccessError::NotFound { .. } => StatusCode::NOT_FOUND,
            // Not a terminal failure: the webhook may simply not have
            // landed yet, so the caller is told to come back.
            AccessError::StillProcessing { .. } => StatusCode::ACCEPTED,
            AccessError::InvalidCredentials | AccessError::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            AccessError::Processor(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &err {
            AccessError::Validation { reason, .. } => reason.clone(),
            AccessError::StillProcessing { .. } => {
                "Access code is still being generated. Please try again shortly.".to_string()
            }
            AccessError::Processor(detail) => {
                tracing::error!(%detail, "Internal error surfaced at HTTP boundary");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(ErrorResponse::new(self.message))).into_response()
    }
}
