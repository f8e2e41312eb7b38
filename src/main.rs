//! Service entry point.
//!
//! Loads configuration from the environment, initializes tracing and
//! metrics, connects PostgreSQL (running migrations), wires the payment
//! gateway and serves the API with graceful shutdown.

use anyhow::Context;
use commerce_api::gateway::{MockPaymentGateway, PaymentGateway, StripeGateway};
use commerce_api::{api, config::Config, connect_database, metrics, state::AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    metrics::register_business_metrics();

    let pool = connect_database(&config.database).await?;
    tracing::info!("database connected, migrations applied");

    let gateway: Arc<dyn PaymentGateway> = if config.gateway.secret_key.is_empty() {
        tracing::warn!("no gateway secret key configured, using mock payment gateway");
        MockPaymentGateway::shared()
    } else {
        Arc::new(StripeGateway::new(&config.gateway).map_err(|e| anyhow::anyhow!("{e}"))?)
    };

    let state = AppState::new(pool, gateway);
    let router = api::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::error!("failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => tracing::error!(%error, "failed to install terminate handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
        () = terminate => tracing::info!("received terminate, shutting down"),
    }
}
