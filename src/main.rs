use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use api_shared::AuthConfig;
use secu_core::constants::DEFAULT_DATA_DIR;
use secu_core::{
    CoreConfig, Services, password_rounds_from_env_value, storage_kind_from_env_value,
};

/// Main entry point for the Secu server
///
/// Resolves configuration from the environment, opens the record store, makes sure an
/// administrator exists and serves the REST API until interrupted.
///
/// # Environment Variables
/// - `SECU_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `SECU_DATA_DIR`: Directory for records and media (default: "secu_data")
/// - `SECU_STORAGE`: `file` or `memory` (default: `file`)
/// - `SECU_PASSWORD_ROUNDS`: PBKDF2 iteration count for new password hashes
/// - `JWT_SECRET`: HS256 signing secret, at least 32 bytes (required)
/// - `JWT_EXPIRATION_SECS`: token lifetime in seconds (default: 86400)
/// - `SECU_BOOTSTRAP_ADMIN_USER` / `SECU_BOOTSTRAP_ADMIN_PASSWORD`: administrator created
///   when no account holds the ADMIN role
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("secu_run=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("secu_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("SECU_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let data_dir = std::env::var("SECU_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.into());
    let storage = storage_kind_from_env_value(std::env::var("SECU_STORAGE").ok())?;
    let password_rounds =
        password_rounds_from_env_value(std::env::var("SECU_PASSWORD_ROUNDS").ok())?;
    let auth = AuthConfig::from_env_values(
        std::env::var("JWT_SECRET").ok(),
        std::env::var("JWT_EXPIRATION_SECS").ok(),
    )?;

    let cfg = Arc::new(CoreConfig::new(
        PathBuf::from(&data_dir),
        storage,
        password_rounds,
    )?);
    tracing::info!("++ Opening {:?} storage under {}", cfg.storage(), data_dir);
    let services = Services::open(cfg)?;

    match (
        std::env::var("SECU_BOOTSTRAP_ADMIN_USER").ok(),
        std::env::var("SECU_BOOTSTRAP_ADMIN_PASSWORD").ok(),
    ) {
        (Some(user), Some(password)) => {
            if let Some(admin) = services.accounts.ensure_bootstrap_admin(&user, &password)? {
                tracing::info!("++ Created bootstrap administrator '{}'", admin.username);
            }
        }
        (Some(_), None) | (None, Some(_)) => {
            tracing::warn!(
                "SECU_BOOTSTRAP_ADMIN_USER and SECU_BOOTSTRAP_ADMIN_PASSWORD must be set together"
            );
        }
        (None, None) => {}
    }

    let app = api_rest::router(AppState::new(services, auth));

    tracing::info!("++ Starting Secu REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("-- Shutting down");
}
