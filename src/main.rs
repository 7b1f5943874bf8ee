//! Gatepass server binary.
//!
//! Loads configuration, wires the Stripe gateway and session service into
//! the HTTP router, and serves the entitlement API.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatepass::adapters::http::{app_router, AppState, CookieSettings};
use gatepass::adapters::stripe::{StripeConfig, StripeGateway};
use gatepass::config::AppConfig;
use gatepass::domain::access::SessionTokenService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    config.validate()?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.server.log_level.clone().into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let stripe_config = StripeConfig::new(
        config.payment.stripe_api_key.clone(),
        config.payment.stripe_webhook_secret.clone(),
    )
    .with_require_livemode(config.payment.require_livemode);

    let gateway = Arc::new(StripeGateway::new(stripe_config));
    let sessions = Arc::new(SessionTokenService::new(
        &SecretString::new(config.auth.session_secret.clone()),
        config.auth.session_ttl_days,
    ));

    let state = AppState {
        gateway,
        sessions,
        currency: config.payment.currency.clone(),
        cookie: CookieSettings {
            name: config.auth.cookie_name.clone(),
            secure: config.is_production(),
            max_age_days: config.auth.session_ttl_days,
        },
    };

    let cors = match config.server.cors_origins_list().as_slice() {
        [] => CorsLayer::permissive(),
        origins => {
            let origins = origins
                .iter()
                .map(|o| o.parse::<axum::http::HeaderValue>())
                .collect::<Result<Vec<_>, _>>()?;
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_credentials(true)
                .allow_headers([axum::http::header::CONTENT_TYPE])
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        }
    };

    let app = app_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(cors);

    let addr = config.server.socket_addr()?;
    tracing::info!(
        %addr,
        environment = ?config.server.environment,
        stripe_test_mode = config.payment.is_test_mode(),
        "gatepass listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => tracing::error!(%error, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
