//! Vybe hub binary.
//!
//! Reads its configuration from the environment (`JWT_SECRET`,
//! `BIND_ADDRESS` or `PORT`, `AUTH_TIMEOUT_SECS`) and serves until Ctrl-C.

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vybe::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vybe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Vybe hub");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        auth_timeout = ?config.auth_timeout,
        "Configuration loaded"
    );

    let verifier = JwtVerifier::new(config.jwt_secret.as_bytes());
    let server = VybeServerBuilder::from_config(&config)
        .build(verifier)
        .await
        .map_err(|e| {
            error!("Failed to bind {}: {}", config.bind_address, e);
            e
        })?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
