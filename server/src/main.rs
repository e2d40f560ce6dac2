//! Passkey gate server.
//!
//! Forward-auth service for a reverse proxy. This binary:
//! - Loads configuration from the environment (and `.env`)
//! - Connects to `PostgreSQL` and applies migrations
//! - Connects to Redis for ceremony and session state
//! - Serves the passkey and forward-auth routes until Ctrl+C or SIGTERM
//!
//! # Usage
//!
//! ```bash
//! DATABASE_URL=postgres://... REDIS_ADDR=localhost:6379 \
//! RP_ID=example.com RP_ORIGIN=https://auth.example.com \
//! cargo run --bin passkey-gate
//! ```

mod config;
mod delivery;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use config::ServerConfig;
use delivery::CodeDelivery;
use passkey_gate_auth::{
    auth_router,
    providers::WebauthnRsProvider,
    stores::{PostgresIdentityRepository, RedisEphemeralStore},
    AuthEnvironment,
};
use passkey_gate_web::correlation_id_layer;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file; reported once logging is up
    let env_file = config::env_file_error(dotenvy::dotenv());

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,passkey_gate_auth=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting passkey gate");
    if let Some(e) = env_file {
        warn!(error = %e, "Ignoring unreadable .env file");
    }

    // Load configuration
    let config = ServerConfig::from_env()?;
    info!(
        rp_id = %config.rp_id,
        rp_origin = %config.rp_origin,
        identity_model = config.identity_model.as_str(),
        "Configuration loaded"
    );
    if config.login_url.is_none() {
        warn!("LOGIN_URL not set: unauthenticated browser requests get a bare 401");
    }

    // Identity repository
    let pool = PgPoolOptions::new()
        .max_connections(config.postgres.max_connections)
        .connect(&config.postgres.url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    let repository = PostgresIdentityRepository::new(pool);
    if config.postgres.run_migrations {
        repository.migrate().await?;
        info!("Database migrations applied");
    }

    // Ephemeral store
    let store = RedisEphemeralStore::new(&config.redis_url).await?;
    store.ping().await?;
    info!("Redis connected");

    // WebAuthn engine and code delivery
    let auth_config = config.auth_config();
    let webauthn = WebauthnRsProvider::new(&auth_config.passkey)?;
    let codes = CodeDelivery::new(config.smtp.as_ref(), config.log_verification_codes);

    let env = Arc::new(AuthEnvironment::new(
        store,
        repository,
        webauthn,
        codes,
        auth_config,
    ));

    let cors = CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(&config.rp_origin).context("RP_ORIGIN is not a valid origin")?,
        )
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = auth_router(env)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer());

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;
    info!(address = %config.addr, "Server listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Graceful shutdown signal handler.
///
/// Waits for:
/// - Ctrl+C (SIGINT)
/// - SIGTERM (in production environments)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
