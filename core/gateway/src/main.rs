//! MediaSync gateway server.
//!
//! Authenticates users once, hands them a signed credential envelope, and
//! proxies file operations to a per-user storage backend session recovered
//! from that envelope on every request. The server holds no durable
//! per-user secret state; a fleet of gateways behind a load balancer can
//! serve the same tokens.

mod config;
mod error;
mod extract;
mod routes;
mod state;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use mediasync_auth::{create_authenticator, EnvelopeManager};
use mediasync_storage::{create_backend, ConnectionPool};

use crate::config::GatewayConfig;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "mediasync-gateway", about = "Stateless media storage gateway")]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = GatewayConfig::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;

    let authenticator = create_authenticator(&config.auth)?;
    info!(provider = authenticator.name(), "authentication provider ready");

    let backend = create_backend(&config.storage)?;
    info!(backend = backend.name(), "storage backend ready");

    let envelopes = EnvelopeManager::new(
        config.envelope.signing_key.as_bytes(),
        config.envelope.encryption_key.as_bytes(),
        &config.envelope.issuer,
        config.envelope_lifetime(),
    )?;

    let pool = ConnectionPool::new(backend.clone(), config.pool_ttl(), config.sweep_interval());

    let state = Arc::new(AppState {
        authenticator,
        envelopes,
        pool,
        backend,
    });

    let app = routes::router(state.clone());

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!(address = %config.listen_addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Close every pooled backend session before exiting.
    state.pool.close().await;
    info!("gateway stopped");

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
