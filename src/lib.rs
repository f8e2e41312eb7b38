//! E-commerce order-fulfillment backend.
//!
//! REST endpoints for cart management, checkout and payment confirmation,
//! backed by PostgreSQL. The core is the order-fulfillment consistency
//! workflow: cart mutation with inventory reservation, checkout snapshot,
//! gateway session, confirmation, settlement, shipment and audit log, with
//! every multi-table step executed as one database transaction.

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod state;
pub mod types;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Embedded database migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Connects the pool from configuration and runs migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn connect_database(config: &config::DatabaseConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout))
        .connect(&config.url)
        .await
        .context("failed to connect to PostgreSQL")?;

    MIGRATOR
        .run(&pool)
        .await
        .context("failed to run database migrations")?;

    Ok(pool)
}
